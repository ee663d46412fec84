use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use ak_core::config::{
    Cadence, CharacterGridConfig, Config, NavigationConfig, ProbeConfig, TimingConfig,
};
use ak_core::tracker::DailyTaskTracker;
use ak_core::types::{CycleResult, Point, RetryConfig};
use ak_harness::{
    CancelToken, Classify, InputDevice, Recover, RecoveryStateMachine, RecoveryTimings, RetryPolicy,
    ScreenClassifier, TextDetector,
};
use tracing::{error, info, warn};

use crate::automation::{self, Automation, AutomationContext};

/// Why one attempt at an entity did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("selection input '{0}' was not delivered")]
    Selection(&'static str),
    #[error("subtask '{0}' failed")]
    Subtask(String),
    #[error("stop requested")]
    Cancelled,
}

/// Capabilities the orchestrator drives.
#[derive(Clone)]
pub struct Capabilities {
    pub device: Arc<dyn InputDevice>,
    pub detector: Arc<dyn TextDetector>,
    pub classifier: Arc<dyn Classify>,
    pub recovery: Arc<dyn Recover>,
}

/// Everything from the config file the orchestrator needs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub timing: TimingConfig,
    pub navigation: NavigationConfig,
    pub grid: CharacterGridConfig,
    /// Confirmation prompt shown after selecting an inactive entity.
    pub login_probe: ProbeConfig,
    /// Busy signal while the selected entity loads.
    pub loading_probe: ProbeConfig,
    pub retry: RetryConfig,
    pub recovery_attempts: u32,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timing: config.timing.clone(),
            navigation: config.navigation.clone(),
            grid: config.character_grid.clone(),
            login_probe: config.screens.character_login.clone(),
            loading_probe: config.screens.loading.clone(),
            retry: config.retry.to_retry_config(),
            recovery_attempts: config.recovery.max_attempts,
        }
    }
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

// ---------------------------------------------------------------------------
// CycleOrchestrator
// ---------------------------------------------------------------------------

/// Runs every entity of one instance through select, confirm and subtasks.
///
/// Entities are visited in increasing index order. Each entity is wrapped
/// in a [`RetryPolicy`]; an entity that still fails is recorded, followed by
/// one extra recovery call, and the run moves on.
pub struct CycleOrchestrator {
    caps: Capabilities,
    settings: OrchestratorSettings,
    tracker: DailyTaskTracker,
    automations: Vec<Box<dyn Automation>>,
    cancel: CancelToken,
}

impl CycleOrchestrator {
    pub fn new(
        caps: Capabilities,
        settings: OrchestratorSettings,
        tracker: DailyTaskTracker,
        automations: Vec<Box<dyn Automation>>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            caps,
            settings,
            tracker,
            automations,
            cancel,
        }
    }

    /// Wire the real classifier, recovery and scripted automations on top of
    /// a device and detector.
    pub fn from_config(
        config: &Config,
        device: Arc<dyn InputDevice>,
        detector: Arc<dyn TextDetector>,
        tracker: DailyTaskTracker,
        cancel: CancelToken,
    ) -> Self {
        let classifier: Arc<dyn Classify> = Arc::new(ScreenClassifier::new(
            detector.clone(),
            &config.screens,
            cancel.clone(),
        ));
        let recovery: Arc<dyn Recover> = Arc::new(RecoveryStateMachine::new(
            classifier.clone(),
            device.clone(),
            config.navigation.map_button,
            RecoveryTimings::from(&config.recovery),
            cancel.clone(),
        ));
        let caps = Capabilities {
            device,
            detector,
            classifier,
            recovery,
        };
        Self::new(
            caps,
            OrchestratorSettings::from_config(config),
            tracker,
            automation::from_config(&config.automations),
            cancel,
        )
    }

    /// Ask the current run to stop at its next checkpoint. Idempotent.
    pub fn request_stop(&self) {
        self.cancel.request_stop();
    }

    /// Handle for stopping the run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn tracker(&self) -> &DailyTaskTracker {
        &self.tracker
    }

    /// Process entities `start_index..entity_count` in order.
    pub fn run_all(&mut self, entity_count: u32, start_index: u32, force_daily_tasks: bool) -> CycleResult {
        let mut result = CycleResult::default();
        let policy = RetryPolicy::new(self.settings.retry.clone(), self.cancel.clone())
            .with_recovery(self.caps.recovery.clone(), self.settings.recovery_attempts);

        info!(entity_count, start_index, force_daily_tasks, "cycle starting");

        for entity in start_index..entity_count {
            if self.cancel.is_cancelled() {
                info!(entity, "stop requested, ending cycle");
                result.stopped_early = true;
                break;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                policy.run("process_entity", || self.process_entity(entity, force_daily_tasks))
            }));

            match outcome {
                Ok(true) => {
                    result.successful_count += 1;
                    info!(entity, "entity complete");
                }
                Ok(false) if self.cancel.is_cancelled() => {
                    // Interrupted mid-entity: neither a success nor a failure.
                    info!(entity, "entity interrupted by stop request");
                    result.stopped_early = true;
                    break;
                }
                Ok(false) => {
                    warn!(entity, "entity failed after retries");
                    self.isolate_failure(entity, &mut result);
                }
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    error!(entity, panic = %msg, "entity processing panicked");
                    self.isolate_failure(entity, &mut result);
                }
            }
        }

        info!(
            processed = result.processed(),
            successful = result.successful_count,
            failed = ?result.failed_entities,
            stopped_early = result.stopped_early,
            "cycle finished"
        );
        result
    }

    /// Record the failure and try once more to reach a neutral screen so the
    /// next entity starts clean.
    fn isolate_failure(&self, entity: u32, result: &mut CycleResult) {
        result.failed_entities.push(entity);
        if !self.caps.recovery.return_to_target(self.settings.recovery_attempts) {
            warn!(entity, "bulkhead recovery did not reach home");
        }
    }

    fn checkpoint(&self) -> Result<(), EntityError> {
        if self.cancel.is_cancelled() {
            Err(EntityError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn pause(&self, d: Duration) -> Result<(), EntityError> {
        if self.cancel.sleep(d) {
            Ok(())
        } else {
            Err(EntityError::Cancelled)
        }
    }

    fn tap(&self, point: Point, post_delay: Duration, what: &'static str) -> Result<(), EntityError> {
        self.checkpoint()?;
        if self.caps.device.click(point.x, point.y, post_delay) {
            Ok(())
        } else {
            Err(EntityError::Selection(what))
        }
    }

    fn process_entity(&mut self, entity: u32, force: bool) -> Result<bool, EntityError> {
        info!(entity, "processing entity");
        self.select_entity(entity)?;
        self.confirm_selection(entity)?;
        self.run_subtasks(entity, force)?;
        Ok(true)
    }

    /// Open the character list and tap the entity's slot.
    fn select_entity(&self, entity: u32) -> Result<(), EntityError> {
        let nav = &self.settings.navigation;
        let timing = &self.settings.timing;

        self.tap(nav.avatar_icon, secs(timing.menu_step_delay_secs), "avatar")?;
        self.tap(nav.settings_icon, secs(timing.menu_step_delay_secs), "settings")?;
        self.tap(nav.characters_icon, secs(timing.selection_screen_delay_secs), "characters")?;

        let (page, slot) = self.settings.grid.locate(entity);
        let scroll = self.settings.grid.scroll;
        for _ in 0..page {
            self.checkpoint()?;
            if !self
                .caps
                .device
                .swipe(scroll.start, scroll.end, Duration::from_millis(scroll.duration_ms))
            {
                return Err(EntityError::Selection("scroll"));
            }
            self.pause(secs(timing.scroll_settle_secs))?;
        }

        self.tap(slot, secs(timing.selection_settle_secs), "slot")
    }

    /// Confirm the switch when prompted and wait for the load to finish.
    fn confirm_selection(&self, entity: u32) -> Result<(), EntityError> {
        self.checkpoint()?;
        let timing = &self.settings.timing;
        let login = &self.settings.login_probe;

        if self.caps.detector.detect_presence(&login.keywords, login.region) {
            info!(entity, "confirmation prompt shown, switching");
            self.tap(self.settings.navigation.yes_button, self.settings.timing.click_delay(), "confirm")?;
            self.wait_for_load(entity)?;
            self.pause(secs(timing.post_load_buffer_secs))?;
        } else {
            // Either already active or the slot tap missed; both look the same.
            info!(entity, "no confirmation prompt, assuming entity already active");
            for _ in 0..3 {
                self.checkpoint()?;
                self.caps.device.send_dismiss();
                self.pause(secs(timing.dismiss_settle_secs))?;
            }
        }
        Ok(())
    }

    /// Poll the loading signal until it clears or the max wait elapses.
    fn wait_for_load(&self, entity: u32) -> Result<(), EntityError> {
        let timing = &self.settings.timing;
        let loading = &self.settings.loading_probe;
        let poll = timing.load_poll_interval_secs.max(1);
        let mut waited = 0;
        while waited < timing.load_max_wait_secs {
            self.checkpoint()?;
            if !self.caps.detector.detect_presence(&loading.keywords, loading.region) {
                return Ok(());
            }
            self.pause(secs(poll))?;
            waited += poll;
        }
        if waited > 0 {
            warn!(entity, waited_secs = waited, "loading did not clear before max wait");
        }
        Ok(())
    }

    /// Daily subtasks (tracker gated) in configured order, then every-cycle ones.
    ///
    /// A failed daily subtask stays unmarked and the run carries on; only an
    /// every-cycle failure fails the entity attempt.
    fn run_subtasks(&mut self, entity: u32, force: bool) -> Result<(), EntityError> {
        let order = [Cadence::Daily, Cadence::EveryCycle];
        for cadence in order {
            for idx in 0..self.automations.len() {
                if self.automations[idx].cadence() != cadence {
                    continue;
                }
                self.checkpoint()?;
                let name = self.automations[idx].name().to_string();

                if cadence == Cadence::Daily && !self.tracker.is_task_due(entity, &name, force) {
                    info!(entity, task = %name, "already done today, skipping");
                    continue;
                }

                let ok = {
                    let ctx = AutomationContext {
                        entity,
                        device: self.caps.device.as_ref(),
                        detector: self.caps.detector.as_ref(),
                        classifier: self.caps.classifier.as_ref(),
                        cancel: &self.cancel,
                        click_delay: self.settings.timing.click_delay(),
                        dismiss_settle: secs(self.settings.timing.dismiss_settle_secs),
                        map_button: self.settings.navigation.map_button,
                    };
                    self.automations[idx].run(&ctx)
                };

                self.checkpoint()?;
                match (cadence, ok) {
                    (Cadence::Daily, true) => self.tracker.mark_task_completed(entity, &name),
                    // Left unmarked so the next cycle tries again.
                    (Cadence::Daily, false) => {
                        warn!(entity, task = %name, "daily subtask failed, continuing with the rest");
                    }
                    (Cadence::EveryCycle, true) => {}
                    (Cadence::EveryCycle, false) => return Err(EntityError::Subtask(name)),
                }
            }
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
