use std::fmt::Write;

use ak_core::config::Config;
use ak_core::schedule::{ScheduleState, ScheduleStore};
use ak_core::tracker::{tracker_path_for_instance, CompletionStatus, DailyTaskTracker, TaskCompletionRecord};
use chrono::NaiveDate;

use super::find_instance;

pub fn run(config: &Config, instance_id: &str, entity: Option<u32>) -> anyhow::Result<()> {
    let instance = find_instance(config, instance_id)?;
    let data_dir = config.data_dir();
    let tracker = DailyTaskTracker::open(tracker_path_for_instance(&data_dir, &instance.id));

    if let Some(entity) = entity {
        print!("{}", render_entity(entity, &tracker.entity_status(entity), tracker.today()));
        return Ok(());
    }

    let schedule = ScheduleStore::new(&data_dir).get(&instance.id);
    print!("{}", render(instance.display_name(), &tracker.completion_status(), &schedule));
    Ok(())
}

fn task_line(record: &TaskCompletionRecord, today: NaiveDate) -> String {
    record
        .iter()
        .map(|(task, date)| {
            let mark = if *date == today { "done" } else { "due" };
            format!("{task}={date} ({mark})")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_entity(entity: u32, record: &TaskCompletionRecord, today: NaiveDate) -> String {
    if record.is_empty() {
        format!("entity {entity}: no tasks recorded (today {today} UTC)\n")
    } else {
        format!("entity {entity}: {} (today {today} UTC)\n", task_line(record, today))
    }
}

fn render(name: &str, status: &CompletionStatus, schedule: &ScheduleState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "instance:     {name}");
    let _ = writeln!(out, "today (UTC):  {}", status.today_utc);
    let _ = writeln!(
        out,
        "last update:  {}",
        status
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".into())
    );

    if status.characters.is_empty() {
        let _ = writeln!(out, "tasks:        none recorded");
    } else {
        let _ = writeln!(out, "tasks:");
        for (entity, record) in &status.characters {
            let _ = writeln!(out, "  #{entity:<3} {}", task_line(record, status.today_utc));
        }
    }

    let _ = writeln!(
        out,
        "schedule:     {} every {}h",
        if schedule.enabled { "enabled" } else { "disabled" },
        schedule.interval_hours
    );
    if let Some(last) = schedule.last_run_utc {
        let _ = writeln!(out, "last run:     {}", last.format("%Y-%m-%d %H:%M UTC"));
    }
    if schedule.enabled {
        let next = schedule
            .next_run_utc
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "now".into());
        let _ = writeln!(out, "next run:     {next}");
    }
    out
}
