use std::fmt::Display;
use std::sync::Arc;

use ak_core::types::RetryConfig;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::recovery::Recover;

/// Retry-with-recovery combinator.
///
/// Wraps a fallible operation so it is tried up to `max_retries + 1` times.
/// Between attempts (never after the last one) the policy optionally runs
/// recovery and then waits `delay_between_retries`. An `Err` from the
/// operation counts as an ordinary failure; nothing escapes as an error.
pub struct RetryPolicy {
    config: RetryConfig,
    recovery: Option<Arc<dyn Recover>>,
    recovery_attempts: u32,
    cancel: CancelToken,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, cancel: CancelToken) -> Self {
        Self {
            config,
            recovery: None,
            recovery_attempts: 5,
            cancel,
        }
    }

    /// Recovery to run between attempts when `recover_to_home` is set.
    pub fn with_recovery(mut self, recovery: Arc<dyn Recover>, max_attempts: u32) -> Self {
        self.recovery = Some(recovery);
        self.recovery_attempts = max_attempts;
        self
    }

    /// Run `op` under this policy. Returns `true` on the first success.
    pub fn run<F, E>(&self, label: &str, mut op: F) -> bool
    where
        F: FnMut() -> Result<bool, E>,
        E: Display,
    {
        let max_attempts = self.config.max_attempts();
        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                info!(operation = label, attempt, "retry loop stopped");
                return false;
            }
            match op() {
                Ok(true) => {
                    if attempt > 1 {
                        info!(operation = label, attempt, "succeeded after retry");
                    }
                    return true;
                }
                Ok(false) => {
                    warn!(operation = label, attempt, max_attempts, "attempt failed");
                }
                Err(e) => {
                    warn!(operation = label, attempt, max_attempts, error = %e, "attempt raised an error");
                }
            }
            if attempt == max_attempts {
                break;
            }
            if self.cancel.is_cancelled() {
                info!(operation = label, attempt, "retry loop stopped");
                return false;
            }
            if self.config.recover_to_home {
                if let Some(recovery) = &self.recovery {
                    if !recovery.return_to_target(self.recovery_attempts) {
                        // A half-recovered screen may still be usable.
                        warn!(operation = label, attempt, "recovery did not reach home, retrying anyway");
                    }
                }
            }
            if !self.cancel.sleep(self.config.delay_between_retries) {
                info!(operation = label, attempt, "retry delay interrupted");
                return false;
            }
            debug!(operation = label, next_attempt = attempt + 1, "retrying");
        }
        warn!(operation = label, max_attempts, "retries exhausted");
        false
    }

    /// Turn `op` into a reusable closure with the retry contract applied.
    pub fn wrap<'a, F, E>(&'a self, label: &'a str, mut op: F) -> impl FnMut() -> bool + 'a
    where
        F: FnMut() -> Result<bool, E> + 'a,
        E: Display + 'a,
    {
        move || self.run(label, &mut op)
    }
}
