use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Duration;

use ak_core::config::{Config, InstanceConfig};
use ak_core::tracker::{tracker_path_for_instance, DailyTaskTracker};
use ak_core::types::CycleResult;
use ak_harness::{AdbDevice, CancelToken, InputDevice, TesseractDetector, TextDetector};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::CycleOrchestrator;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Per-run overrides of the instance's configured range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub force_daily_tasks: bool,
    pub start_index: Option<u32>,
    pub entity_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every entity succeeded.
    Completed,
    /// Ran to the end with at least one failed entity.
    Partial,
    /// A stop request ended the run early.
    Stopped,
    /// The session could not get as far as running the cycle.
    Failed(String),
}

impl SessionOutcome {
    pub fn from_cycle(cycle: &CycleResult) -> Self {
        if cycle.stopped_early {
            SessionOutcome::Stopped
        } else if !cycle.failed_entities.is_empty() {
            SessionOutcome::Partial
        } else {
            SessionOutcome::Completed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub run_id: Uuid,
    pub instance_id: String,
    pub outcome: SessionOutcome,
    pub cycle: CycleResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    /// Report for a session that ended without producing a cycle result.
    pub fn failed(instance_id: &str, started_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            instance_id: instance_id.to_string(),
            outcome: SessionOutcome::Failed(reason.into()),
            cycle: CycleResult::default(),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// InstanceSession
// ---------------------------------------------------------------------------

/// One end-to-end run against one emulator instance: boot, connect, launch
/// the game, run the cycle, shut down.
pub struct InstanceSession {
    config: Arc<Config>,
    instance: InstanceConfig,
    options: RunOptions,
    cancel: CancelToken,
}

impl InstanceSession {
    pub fn new(config: Arc<Config>, instance: InstanceConfig, options: RunOptions, cancel: CancelToken) -> Self {
        Self {
            config,
            instance,
            options,
            cancel,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance.id
    }

    /// Run to completion. Never panics or errors; problems end up in the
    /// report's outcome.
    pub fn run(self) -> SessionReport {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(instance = %self.instance.id, %run_id, "session starting");

        let mut emulator = None;
        let result = self.execute(&mut emulator);

        if self.instance.exit_after_complete {
            self.shut_down(emulator);
        }

        let (outcome, cycle) = match result {
            Ok(cycle) => (SessionOutcome::from_cycle(&cycle), cycle),
            Err(e) => {
                warn!(instance = %self.instance.id, error = %format!("{e:#}"), "session failed");
                (SessionOutcome::Failed(format!("{e:#}")), CycleResult::default())
            }
        };
        info!(instance = %self.instance.id, %run_id, outcome = ?outcome, "session finished");

        SessionReport {
            run_id,
            instance_id: self.instance.id.clone(),
            outcome,
            cycle,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn execute(&self, emulator: &mut Option<Child>) -> Result<CycleResult> {
        if let Some(cmd) = &self.instance.emulator_command {
            *emulator = Some(spawn_emulator(cmd)?);
        }

        let adb = Arc::new(
            AdbDevice::new(&self.config.device.adb_path, &self.instance.adb_serial).with_cancel(self.cancel.clone()),
        );
        self.connect(&adb)?;

        let game = &self.config.game;
        adb.start_app(&game.package_name, &game.activity_name)
            .context("failed to start the game")?;
        info!(instance = %self.instance.id, wait_secs = game.game_load_wait_secs, "waiting for game to load");
        if !self.cancel.sleep(Duration::from_secs(game.game_load_wait_secs)) {
            return Ok(CycleResult {
                stopped_early: true,
                ..CycleResult::default()
            });
        }

        let device: Arc<dyn InputDevice> = adb;
        let detector: Arc<dyn TextDetector> = Arc::new(TesseractDetector::new(
            &self.config.device.tesseract_path,
            self.config.device.ocr_page_modes.clone(),
            device.clone(),
        ));
        let tracker = DailyTaskTracker::open(tracker_path_for_instance(&self.config.data_dir(), &self.instance.id));
        let mut orchestrator =
            CycleOrchestrator::from_config(&self.config, device, detector, tracker, self.cancel.clone());

        let entity_count = self.options.entity_count.unwrap_or(self.instance.entity_count);
        let start_index = self.options.start_index.unwrap_or(self.instance.start_index);
        if start_index > entity_count {
            bail!("start index {start_index} is past entity count {entity_count}");
        }
        Ok(orchestrator.run_all(entity_count, start_index, self.options.force_daily_tasks))
    }

    fn connect(&self, adb: &AdbDevice) -> Result<()> {
        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match adb.connect() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(serial = adb.serial(), attempt, error = %e, "adb connect failed");
                    last_err = Some(e);
                }
            }
            if attempt < CONNECT_ATTEMPTS && !self.cancel.sleep(CONNECT_RETRY_DELAY) {
                bail!("stopped while connecting to {}", adb.serial());
            }
        }
        match last_err {
            Some(e) => Err(e).with_context(|| format!("could not connect to {}", adb.serial())),
            None => bail!("could not connect to {}", adb.serial()),
        }
    }

    fn shut_down(&self, emulator: Option<Child>) {
        let adb = AdbDevice::new(&self.config.device.adb_path, &self.instance.adb_serial);
        if let Err(e) = adb.force_stop_app(&self.config.game.package_name) {
            warn!(instance = %self.instance.id, error = %e, "failed to stop the game");
        }
        if let Some(mut child) = emulator {
            match child.kill().and_then(|_| child.wait()) {
                Ok(status) => info!(instance = %self.instance.id, %status, "emulator stopped"),
                Err(e) => warn!(instance = %self.instance.id, error = %e, "failed to stop emulator"),
            }
        }
    }
}

fn spawn_emulator(cmd: &[String]) -> Result<Child> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("emulator_command is empty");
    };
    let child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("failed to launch emulator '{program}'"))?;
    info!(program = %program, pid = child.id(), "emulator launched");
    Ok(child)
}
