use std::thread::JoinHandle;

use ak_harness::CancelToken;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::session::SessionReport;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("instance '{0}' is already running")]
    AlreadyRunning(String),
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct RunningInstance {
    cancel: CancelToken,
    handle: JoinHandle<SessionReport>,
    started_at: DateTime<Utc>,
}

/// Registry of instances currently running on their own OS thread.
///
/// Instances share nothing but read-only config, so each gets its own
/// thread and its own [`CancelToken`].
#[derive(Default)]
pub struct Launcher {
    running: DashMap<String, RunningInstance>,
}

impl Launcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `job` on a new thread for `instance_id`. The job receives the
    /// instance's cancel token and returns the session report.
    pub fn launch<F>(&self, instance_id: &str, job: F) -> Result<(), LaunchError>
    where
        F: FnOnce(CancelToken) -> SessionReport + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        match self.running.entry(instance_id.to_string()) {
            Entry::Occupied(_) => Err(LaunchError::AlreadyRunning(instance_id.to_string())),
            Entry::Vacant(slot) => {
                let cancel = CancelToken::new();
                let token = cancel.clone();
                let handle = std::thread::Builder::new()
                    .name(format!("ak-{instance_id}"))
                    .spawn(move || job(token))?;
                slot.insert(RunningInstance {
                    cancel,
                    handle,
                    started_at: Utc::now(),
                });
                info!(instance = instance_id, "instance launched");
                Ok(())
            }
        }
    }

    /// Request a cooperative stop. Returns `false` if the instance is not
    /// registered.
    pub fn stop(&self, instance_id: &str) -> bool {
        match self.running.get(instance_id) {
            Some(entry) => {
                info!(instance = instance_id, "stopping instance");
                entry.cancel.request_stop();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        for entry in self.running.iter() {
            entry.cancel.request_stop();
        }
        info!(count = self.running.len(), "stop requested for all instances");
    }

    /// Registered and its thread has not finished yet.
    pub fn is_running(&self, instance_id: &str) -> bool {
        self.running
            .get(instance_id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Ids of registered instances, sorted.
    pub fn running(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.running.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Remove instances whose thread has exited and return their reports.
    pub fn reap_finished(&self) -> Vec<SessionReport> {
        let finished: Vec<String> = self
            .running
            .iter()
            .filter(|e| e.handle.is_finished())
            .map(|e| e.key().clone())
            .collect();
        finished.into_iter().filter_map(|id| self.take(&id)).collect()
    }

    /// Wait for every registered instance to finish.
    pub fn join_all(&self) -> Vec<SessionReport> {
        let ids = self.running();
        ids.into_iter().filter_map(|id| self.take(&id)).collect()
    }

    fn take(&self, instance_id: &str) -> Option<SessionReport> {
        let (id, instance) = self.running.remove(instance_id)?;
        match instance.handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!(instance = %id, "session thread panicked");
                Some(SessionReport::failed(&id, instance.started_at, "session thread panicked"))
            }
        }
    }
}

impl Drop for Launcher {
    fn drop(&mut self) {
        if !self.running.is_empty() {
            warn!(count = self.running.len(), "launcher dropped with instances still registered");
            self.stop_all();
        }
    }
}
