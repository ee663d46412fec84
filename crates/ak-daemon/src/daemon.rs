use std::sync::Arc;
use std::time::Duration;

use ak_core::config::{Config, InstanceConfig};
use ak_core::schedule::ScheduleStore;
use ak_harness::CancelToken;
use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::launcher::{LaunchError, Launcher};
use crate::session::{InstanceSession, RunOptions, SessionOutcome, SessionReport};

/// Default time between schedule checks.
pub const DEFAULT_POLL_SECS: u64 = 60;

/// How one instance's session is started. Swapped out in tests.
pub type SessionRunner = Arc<dyn Fn(&InstanceConfig, CancelToken) -> SessionReport + Send + Sync>;

/// What one polling pass did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub launched: Vec<String>,
    pub finished: Vec<SessionReport>,
}

/// Schedule-driven background runner.
///
/// Every poll it reaps finished sessions (recording the run in the
/// instance's schedule) and launches each enabled instance that is due and
/// not already running. Shuts down when [`Daemon::shutdown`] is called.
pub struct Daemon {
    config: Arc<Config>,
    schedules: ScheduleStore,
    launcher: Launcher,
    runner: SessionRunner,
    poll_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl Daemon {
    pub fn new(config: Arc<Config>) -> Self {
        let schedules = ScheduleStore::new(config.data_dir());
        let session_config = config.clone();
        let runner: SessionRunner = Arc::new(move |instance, cancel| {
            InstanceSession::new(session_config.clone(), instance.clone(), RunOptions::default(), cancel).run()
        });
        Self::with_runner(config, schedules, runner)
    }

    /// Build with a custom schedule store and session runner (for testing).
    pub fn with_runner(config: Arc<Config>, schedules: ScheduleStore, runner: SessionRunner) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            schedules,
            launcher: Launcher::new(),
            runner,
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            shutdown_tx,
        }
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Stop the polling loop and every running session.
    pub fn shutdown(&self) {
        info!("daemon shutdown requested");
        self.shutdown_tx.send_replace(true);
        self.launcher.stop_all();
    }

    /// One polling pass.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for finished in self.launcher.reap_finished() {
            self.record_finished(&finished);
            report.finished.push(finished);
        }

        if *self.shutdown_tx.borrow() {
            return report;
        }

        for instance in self.config.instances.iter().filter(|i| i.enabled) {
            if self.launcher.is_running(&instance.id) || !self.schedules.is_due(&instance.id) {
                continue;
            }
            let runner = self.runner.clone();
            let job_instance = instance.clone();
            match self.launcher.launch(&instance.id, move |cancel| runner(&job_instance, cancel)) {
                Ok(()) => report.launched.push(instance.id.clone()),
                Err(LaunchError::AlreadyRunning(_)) => {}
                Err(e) => error!(instance = %instance.id, error = %e, "failed to launch instance"),
            }
        }
        report
    }

    fn record_finished(&self, report: &SessionReport) {
        info!(
            instance = %report.instance_id,
            run_id = %report.run_id,
            outcome = ?report.outcome,
            successful = report.cycle.successful_count,
            failed = ?report.cycle.failed_entities,
            "session finished"
        );
        // A stopped run did not really happen; leave it due.
        if report.outcome == SessionOutcome::Stopped {
            return;
        }
        if let Err(e) = self.schedules.mark_run_complete(&report.instance_id) {
            warn!(instance = %report.instance_id, error = %e, "failed to record run in schedule");
        }
    }

    /// Poll until shutdown, then wait for running sessions to unwind.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut interval = tokio::time::interval(self.poll_interval);
        info!(
            poll_secs = self.poll_interval.as_secs(),
            instances = self.config.instances.len(),
            "daemon started"
        );

        while !*shutdown_rx.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let tick = self.tick();
                    if !tick.launched.is_empty() {
                        info!(launched = ?tick.launched, "instances launched");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("shutdown signal received, stopping poll loop");

        self.launcher.stop_all();
        let this = self.clone();
        let reports = tokio::task::spawn_blocking(move || this.launcher.join_all()).await?;
        for report in &reports {
            self.record_finished(report);
        }
        info!(sessions = reports.len(), "daemon stopped");
        Ok(())
    }
}
