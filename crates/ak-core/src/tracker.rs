//! Per-entity daily task completion tracking.
//!
//! One JSON file per managed instance records, for every entity index, the
//! UTC calendar date on which each daily task last completed:
//!
//! ```json
//! {
//!   "last_updated": "2026-03-01T08:12:44.120Z",
//!   "characters": { "0": { "build": "2026-03-01" } }
//! }
//! ```
//!
//! The store is a convenience that lets a run skip work already done today.
//! Losing it only causes a harmless re-run, so unreadable files load as an
//! empty store and failed writes are logged rather than returned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

pub const TASK_BUILD: &str = "build";
pub const TASK_EXPEDITION: &str = "expedition";

/// `task name -> last completed UTC date` for one entity.
pub type TaskCompletionRecord = BTreeMap<String, NaiveDate>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Store document
// ---------------------------------------------------------------------------

/// On-disk document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStore {
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub characters: BTreeMap<u32, TaskCompletionRecord>,
}

/// Snapshot handed to status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionStatus {
    pub today_utc: NaiveDate,
    pub last_updated: Option<DateTime<Utc>>,
    pub characters: BTreeMap<u32, TaskCompletionRecord>,
}

// ---------------------------------------------------------------------------
// DailyTaskTracker
// ---------------------------------------------------------------------------

pub struct DailyTaskTracker {
    path: PathBuf,
    store: TrackerStore,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DailyTaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyTaskTracker")
            .field("path", &self.path)
            .field("store", &self.store)
            .finish()
    }
}

impl DailyTaskTracker {
    /// Open (or start) the tracker stored at `path`, using the wall clock.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    /// Open with an injected clock.
    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let store = load_store(&path);
        Self { path, store, clock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// `true` when `task` was recorded for `entity` on today's UTC date.
    pub fn is_task_completed_today(&self, entity: u32, task: &str) -> bool {
        let today = self.clock.today();
        let done = self
            .store
            .characters
            .get(&entity)
            .and_then(|record| record.get(task))
            .is_some_and(|date| *date == today);
        if done {
            debug!(entity, task, %today, "task already completed today (UTC)");
        }
        done
    }

    /// Whether `task` should run for `entity`. `force` overrides the record.
    pub fn is_task_due(&self, entity: u32, task: &str, force: bool) -> bool {
        force || !self.is_task_completed_today(entity, task)
    }

    /// Record today's UTC date for `task` and persist immediately.
    pub fn mark_task_completed(&mut self, entity: u32, task: &str) {
        let today = self.clock.today();
        self.store
            .characters
            .entry(entity)
            .or_default()
            .insert(task.to_string(), today);
        self.persist();
        info!(entity, task, %today, "marked task completed (UTC)");
    }

    /// Forget every completion for every entity.
    pub fn reset_all_tasks(&mut self) {
        self.store.characters.clear();
        self.persist();
        info!("reset all daily task completion tracking");
    }

    /// Forget completions for one entity. No write when nothing was stored.
    pub fn reset_tasks_for_entity(&mut self, entity: u32) {
        if self.store.characters.remove(&entity).is_some() {
            self.persist();
            info!(entity, "reset daily tasks for entity");
        }
    }

    pub fn completion_status(&self) -> CompletionStatus {
        CompletionStatus {
            today_utc: self.clock.today(),
            last_updated: self.store.last_updated,
            characters: self.store.characters.clone(),
        }
    }

    pub fn entity_status(&self, entity: u32) -> TaskCompletionRecord {
        self.store
            .characters
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    /// Rewrite the whole file. Errors are returned here; the mutating
    /// operations above log them and keep the in-memory state.
    pub fn save(&mut self) -> Result<(), TrackerError> {
        self.store.last_updated = Some(self.clock.now());
        write_replace(&self.path, &serde_json::to_vec_pretty(&self.store)?)?;
        debug!(path = %self.path.display(), "saved daily task tracking");
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to save daily task tracking, keeping in-memory state"
            );
        }
    }
}

/// Tracker file for a managed instance: `<dir>/<id>_daily_tasks.json`.
pub fn tracker_path_for_instance(instances_dir: &Path, instance_id: &str) -> PathBuf {
    instances_dir.join(format!("{instance_id}_daily_tasks.json"))
}

fn load_store(path: &Path) -> TrackerStore {
    if !path.exists() {
        return TrackerStore::default();
    }
    let parsed = std::fs::read(path)
        .map_err(TrackerError::from)
        .and_then(|bytes| serde_json::from_slice::<TrackerStore>(&bytes).map_err(Into::into));
    match parsed {
        Ok(store) => {
            debug!(path = %path.display(), "loaded daily task tracking");
            store
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable tracking file, starting fresh");
            TrackerStore::default()
        }
    }
}

/// Replace `path` with `bytes` via a sibling temp file and a rename, so a
/// reader never observes a half-written document.
pub(crate) fn write_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn temp_tracker() -> (DailyTaskTracker, Arc<ManualClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        ));
        let tracker =
            DailyTaskTracker::with_clock(dir.path().join("default_daily_tasks.json"), clock.clone());
        (tracker, clock, dir)
    }

    #[test]
    fn absent_record_is_not_completed() {
        let (tracker, _clock, _dir) = temp_tracker();
        assert!(!tracker.is_task_completed_today(0, TASK_BUILD));
        assert!(tracker.is_task_due(0, TASK_BUILD, false));
    }

    #[test]
    fn mark_then_query_same_day() {
        let (mut tracker, _clock, _dir) = temp_tracker();
        tracker.mark_task_completed(2, TASK_BUILD);
        assert!(tracker.is_task_completed_today(2, TASK_BUILD));
        assert!(!tracker.is_task_completed_today(2, TASK_EXPEDITION));
        assert!(!tracker.is_task_completed_today(1, TASK_BUILD));
    }

    #[test]
    fn rollover_makes_task_due_again() {
        let (mut tracker, clock, _dir) = temp_tracker();
        tracker.mark_task_completed(0, TASK_BUILD);
        clock.advance(chrono::Duration::hours(14));
        assert!(!tracker.is_task_completed_today(0, TASK_BUILD));
    }

    #[test]
    fn force_overrides_record() {
        let (mut tracker, _clock, _dir) = temp_tracker();
        tracker.mark_task_completed(0, TASK_BUILD);
        assert!(!tracker.is_task_due(0, TASK_BUILD, false));
        assert!(tracker.is_task_due(0, TASK_BUILD, true));
    }

    #[test]
    fn mark_persists_immediately() {
        let (mut tracker, clock, _dir) = temp_tracker();
        tracker.mark_task_completed(3, TASK_EXPEDITION);

        let reopened = DailyTaskTracker::with_clock(tracker.path(), clock);
        assert!(reopened.is_task_completed_today(3, TASK_EXPEDITION));
        assert!(reopened.completion_status().last_updated.is_some());
    }

    #[test]
    fn file_uses_string_entity_keys_and_iso_dates() {
        let (mut tracker, _clock, _dir) = temp_tracker();
        tracker.mark_task_completed(4, TASK_BUILD);

        let text = std::fs::read_to_string(tracker.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["characters"]["4"]["build"], "2026-03-01");
        assert!(doc["last_updated"].as_str().unwrap().starts_with("2026-03-01T10:00:00"));
    }

    #[test]
    fn reset_all_clears_everything() {
        let (mut tracker, _clock, _dir) = temp_tracker();
        tracker.mark_task_completed(0, TASK_BUILD);
        tracker.mark_task_completed(1, TASK_EXPEDITION);
        tracker.reset_all_tasks();
        assert!(!tracker.is_task_completed_today(0, TASK_BUILD));
        assert!(!tracker.is_task_completed_today(1, TASK_EXPEDITION));
        assert!(tracker.completion_status().characters.is_empty());
    }

    #[test]
    fn reset_single_entity_keeps_others() {
        let (mut tracker, _clock, _dir) = temp_tracker();
        tracker.mark_task_completed(0, TASK_BUILD);
        tracker.mark_task_completed(1, TASK_BUILD);
        tracker.reset_tasks_for_entity(0);
        assert!(!tracker.is_task_completed_today(0, TASK_BUILD));
        assert!(tracker.is_task_completed_today(1, TASK_BUILD));
        assert!(tracker.entity_status(0).is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken_daily_tasks.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let tracker = DailyTaskTracker::open(&path);
        assert!(tracker.completion_status().characters.is_empty());
        assert!(!tracker.is_task_completed_today(0, TASK_BUILD));
    }

    #[test]
    fn reads_documents_with_offset_timestamps_and_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy_daily_tasks.json");
        std::fs::write(
            &path,
            r#"{"last_updated": "2026-03-01T09:30:00.123456+00:00",
                "characters": {"0": {"build": "2026-03-01"}}}"#,
        )
        .unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let tracker = DailyTaskTracker::with_clock(&path, clock);
        assert!(tracker.is_task_completed_today(0, TASK_BUILD));

        std::fs::write(&path, r#"{"last_updated": null, "characters": {}}"#).unwrap();
        let tracker = DailyTaskTracker::open(&path);
        assert!(tracker.completion_status().last_updated.is_none());
    }

    #[test]
    fn unwritable_location_keeps_in_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let mut tracker = DailyTaskTracker::with_clock(blocker.join("tasks.json"), clock);

        tracker.mark_task_completed(0, TASK_BUILD);
        assert!(tracker.is_task_completed_today(0, TASK_BUILD));
        assert!(tracker.save().is_err());
    }

    #[test]
    fn instance_path_layout() {
        let p = tracker_path_for_instance(Path::new("/data/instances"), "farm-1");
        assert_eq!(p, PathBuf::from("/data/instances/farm-1_daily_tasks.json"));
    }
}
