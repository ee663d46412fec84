use ak_core::config::Config;
use ak_core::schedule::ScheduleStore;

use super::find_instance;

/// What `ak schedule` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Show,
    Enable,
    Disable,
    Interval(u32),
}

pub fn run(config: &Config, instance_id: &str, change: Change) -> anyhow::Result<()> {
    let instance = find_instance(config, instance_id)?;
    let store = ScheduleStore::new(config.data_dir());

    let state = match change {
        Change::Show => store.get(&instance.id),
        Change::Enable => store.set_enabled(&instance.id, true)?,
        Change::Disable => store.set_enabled(&instance.id, false)?,
        Change::Interval(hours) => store.set_interval(&instance.id, hours)?,
    };

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
