use ak_core::config::Config;
use ak_core::tracker::{tracker_path_for_instance, DailyTaskTracker};

use super::find_instance;

pub fn run(config: &Config, instance_id: &str, entity: Option<u32>) -> anyhow::Result<()> {
    let instance = find_instance(config, instance_id)?;
    let mut tracker = DailyTaskTracker::open(tracker_path_for_instance(&config.data_dir(), &instance.id));

    match entity {
        Some(entity) => {
            tracker.reset_tasks_for_entity(entity);
            println!("Reset daily tasks for entity {entity} on '{}'.", instance.id);
        }
        None => {
            tracker.reset_all_tasks();
            println!("Reset all daily tasks on '{}'.", instance.id);
        }
    }
    Ok(())
}
