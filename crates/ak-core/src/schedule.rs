//! Interval-based run schedule per managed instance.
//!
//! Each instance has a small JSON file (`<dir>/<id>_schedule.json`) saying
//! whether unattended runs are enabled, how often they happen, and when the
//! last and next runs are. Like the task tracker, an unreadable file falls
//! back to defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::tracker::write_replace;

pub const DEFAULT_INTERVAL_HOURS: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("interval must be at least one hour")]
    InvalidInterval,
}

/// Persisted schedule for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
    #[serde(default)]
    pub last_run_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_utc: Option<DateTime<Utc>>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            last_run_utc: None,
            next_run_utc: None,
        }
    }
}

fn default_interval_hours() -> u32 {
    DEFAULT_INTERVAL_HOURS
}

impl ScheduleState {
    fn interval(&self) -> Duration {
        Duration::hours(i64::from(self.interval_hours))
    }
}

/// File-backed schedule store covering every instance in a directory.
pub struct ScheduleStore {
    base_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ScheduleStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(base_dir, Arc::new(SystemClock))
    }

    pub fn with_clock(base_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_dir: base_dir.into(),
            clock,
        }
    }

    fn schedule_path(&self, instance_id: &str) -> PathBuf {
        schedule_path_for_instance(&self.base_dir, instance_id)
    }

    /// Current schedule, or defaults when missing or unreadable.
    pub fn get(&self, instance_id: &str) -> ScheduleState {
        let path = self.schedule_path(instance_id);
        if !path.exists() {
            return ScheduleState::default();
        }
        let parsed = std::fs::read(&path)
            .map_err(ScheduleError::from)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Into::into));
        match parsed {
            Ok(state) => state,
            Err(e) => {
                warn!(instance = instance_id, error = %e, "unreadable schedule, using defaults");
                ScheduleState::default()
            }
        }
    }

    pub fn save(&self, instance_id: &str, state: &ScheduleState) -> Result<(), ScheduleError> {
        let path = self.schedule_path(instance_id);
        write_replace(&path, &serde_json::to_vec_pretty(state)?)?;
        debug!(instance = instance_id, "saved schedule");
        Ok(())
    }

    /// Enable or disable unattended runs. Enabling without a pending next run
    /// schedules the first one one interval from now.
    pub fn set_enabled(&self, instance_id: &str, enabled: bool) -> Result<ScheduleState, ScheduleError> {
        let mut state = self.get(instance_id);
        state.enabled = enabled;
        if enabled && state.next_run_utc.is_none() {
            state.next_run_utc = Some(self.clock.now() + state.interval());
        }
        self.save(instance_id, &state)?;
        info!(instance = instance_id, enabled, "schedule toggled");
        Ok(state)
    }

    /// Change the interval. When enabled and a previous run exists, the next
    /// run is recomputed from that previous run.
    pub fn set_interval(&self, instance_id: &str, hours: u32) -> Result<ScheduleState, ScheduleError> {
        if hours == 0 {
            return Err(ScheduleError::InvalidInterval);
        }
        let mut state = self.get(instance_id);
        state.interval_hours = hours;
        if state.enabled {
            if let Some(last) = state.last_run_utc {
                state.next_run_utc = Some(last + state.interval());
            }
        }
        self.save(instance_id, &state)?;
        info!(instance = instance_id, hours, "schedule interval set");
        Ok(state)
    }

    /// Enabled and either never scheduled or past the next run time.
    pub fn is_due(&self, instance_id: &str) -> bool {
        let state = self.get(instance_id);
        if !state.enabled {
            return false;
        }
        match state.next_run_utc {
            None => true,
            Some(next) => self.clock.now() >= next,
        }
    }

    /// Record a finished run and push the next one out by one interval.
    pub fn mark_run_complete(&self, instance_id: &str) -> Result<ScheduleState, ScheduleError> {
        let mut state = self.get(instance_id);
        let now = self.clock.now();
        state.last_run_utc = Some(now);
        state.next_run_utc = Some(now + state.interval());
        self.save(instance_id, &state)?;
        info!(
            instance = instance_id,
            next_run = ?state.next_run_utc,
            "run complete, next run scheduled"
        );
        Ok(state)
    }

    /// Next run time while enabled.
    pub fn next_run(&self, instance_id: &str) -> Option<DateTime<Utc>> {
        let state = self.get(instance_id);
        if state.enabled {
            state.next_run_utc
        } else {
            None
        }
    }
}

/// Schedule file for a managed instance: `<dir>/<id>_schedule.json`.
pub fn schedule_path_for_instance(instances_dir: &Path, instance_id: &str) -> PathBuf {
    instances_dir.join(format!("{instance_id}_schedule.json"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn temp_store() -> (ScheduleStore, Arc<ManualClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap()));
        (ScheduleStore::with_clock(dir.path(), clock.clone()), clock, dir)
    }

    #[test]
    fn defaults_when_missing() {
        let (store, _clock, _dir) = temp_store();
        let state = store.get("a");
        assert!(!state.enabled);
        assert_eq!(state.interval_hours, DEFAULT_INTERVAL_HOURS);
        assert!(!store.is_due("a"));
    }

    #[test]
    fn enabling_schedules_one_interval_out() {
        let (store, clock, _dir) = temp_store();
        let state = store.set_enabled("a", true).unwrap();
        assert_eq!(state.next_run_utc, Some(clock.now() + Duration::hours(12)));
        assert!(!store.is_due("a"));

        clock.advance(Duration::hours(12));
        assert!(store.is_due("a"));
    }

    #[test]
    fn mark_complete_moves_next_run() {
        let (store, clock, _dir) = temp_store();
        store.set_enabled("a", true).unwrap();
        clock.advance(Duration::hours(13));
        let state = store.mark_run_complete("a").unwrap();
        assert_eq!(state.last_run_utc, Some(clock.now()));
        assert_eq!(store.next_run("a"), Some(clock.now() + Duration::hours(12)));
        assert!(!store.is_due("a"));
    }

    #[test]
    fn interval_change_recomputes_from_last_run() {
        let (store, clock, _dir) = temp_store();
        store.set_enabled("a", true).unwrap();
        store.mark_run_complete("a").unwrap();
        let last = clock.now();
        let state = store.set_interval("a", 4).unwrap();
        assert_eq!(state.next_run_utc, Some(last + Duration::hours(4)));
        assert!(matches!(store.set_interval("a", 0), Err(ScheduleError::InvalidInterval)));
    }

    #[test]
    fn enabled_without_next_run_is_due() {
        let (store, _clock, _dir) = temp_store();
        let state = ScheduleState {
            enabled: true,
            ..ScheduleState::default()
        };
        store.save("a", &state).unwrap();
        assert!(store.is_due("a"));
    }

    #[test]
    fn corrupt_file_uses_defaults() {
        let (store, _clock, dir) = temp_store();
        std::fs::write(dir.path().join("a_schedule.json"), b"[1,2").unwrap();
        assert_eq!(store.get("a"), ScheduleState::default());
    }
}
