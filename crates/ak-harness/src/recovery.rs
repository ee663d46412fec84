use std::sync::Arc;
use std::time::Duration;

use ak_core::config::RecoveryConfig;
use ak_core::types::{Point, ScreenState};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::classifier::Classify;
use crate::device::InputDevice;

/// Anything that can try to bring the UI back to a known-good screen.
pub trait Recover: Send + Sync {
    fn return_to_target(&self, max_attempts: u32) -> bool;
}

/// Settle delays used by the corrective actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTimings {
    pub map_settle: Duration,
    pub dismiss_settle: Duration,
    pub login_extra_buffer: Duration,
    pub unknown_settle: Duration,
}

impl RecoveryTimings {
    pub fn instant() -> Self {
        Self {
            map_settle: Duration::ZERO,
            dismiss_settle: Duration::ZERO,
            login_extra_buffer: Duration::ZERO,
            unknown_settle: Duration::ZERO,
        }
    }
}

impl From<&RecoveryConfig> for RecoveryTimings {
    fn from(cfg: &RecoveryConfig) -> Self {
        Self {
            map_settle: Duration::from_millis(cfg.map_settle_ms),
            dismiss_settle: Duration::from_millis(cfg.dismiss_settle_ms),
            login_extra_buffer: Duration::from_millis(cfg.login_extra_buffer_ms),
            unknown_settle: Duration::from_millis(cfg.unknown_settle_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryStateMachine
// ---------------------------------------------------------------------------

/// Bounded observe-act loop that steers the UI back to the home village.
///
/// The game never confirms that an input had an effect, so every action is
/// followed by a fresh classification instead of assuming progress.
pub struct RecoveryStateMachine {
    classifier: Arc<dyn Classify>,
    device: Arc<dyn InputDevice>,
    map_button: Point,
    timings: RecoveryTimings,
    target: ScreenState,
    cancel: CancelToken,
}

impl RecoveryStateMachine {
    pub fn new(
        classifier: Arc<dyn Classify>,
        device: Arc<dyn InputDevice>,
        map_button: Point,
        timings: RecoveryTimings,
        cancel: CancelToken,
    ) -> Self {
        Self {
            classifier,
            device,
            map_button,
            timings,
            target: ScreenState::HomeVillage,
            cancel,
        }
    }

    fn dismiss_times(&self, count: u32) {
        for _ in 0..count {
            if !self.device.send_dismiss() {
                debug!("dismiss signal not delivered");
            }
            self.cancel.sleep(self.timings.dismiss_settle);
        }
    }

    /// Corrective action for one observed state.
    fn correct(&self, state: ScreenState) {
        match state {
            ScreenState::MapScreen => {
                info!(state = %state, action = "toggle_map", "recovery action");
                self.device
                    .click(self.map_button.x, self.map_button.y, self.timings.map_settle);
            }
            ScreenState::CharacterLogin => {
                info!(state = %state, action = "dismiss_x3", "recovery action");
                self.dismiss_times(3);
                self.cancel.sleep(self.timings.login_extra_buffer);
            }
            ScreenState::AllianceMenu => {
                info!(state = %state, action = "dismiss_x2", "recovery action");
                self.dismiss_times(2);
            }
            ScreenState::DialogOpen => {
                info!(state = %state, action = "dismiss", "recovery action");
                self.dismiss_times(1);
            }
            ScreenState::Unknown => {
                info!(state = %state, action = "blind_dismiss", "recovery action");
                self.device.send_dismiss();
                self.cancel.sleep(self.timings.unknown_settle);
            }
            ScreenState::HomeVillage => {}
        }
    }
}

impl Recover for RecoveryStateMachine {
    fn return_to_target(&self, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                info!(attempt, "recovery abandoned, stop requested");
                return false;
            }
            let state = self.classifier.classify();
            if state == self.target {
                debug!(attempt, "recovery reached target");
                return true;
            }
            self.correct(state);
        }
        warn!(max_attempts, target = %self.target, "recovery exhausted attempts");
        false
    }
}
