use std::time::Duration;

use ak_core::config::{AutomationConfig, Cadence, Step};
use ak_core::types::{Point, ScreenState};
use ak_harness::{CancelToken, Classify, InputDevice, TextDetector};
use tracing::{debug, info, warn};

/// Everything a subtask may touch while it runs for one entity.
pub struct AutomationContext<'a> {
    pub entity: u32,
    pub device: &'a dyn InputDevice,
    pub detector: &'a dyn TextDetector,
    pub classifier: &'a dyn Classify,
    pub cancel: &'a CancelToken,
    /// Post-click delay for steps that do not set their own.
    pub click_delay: Duration,
    pub dismiss_settle: Duration,
    pub map_button: Point,
}

/// One per-entity workflow. `run` returns its own success signal; daily
/// automations are only marked complete when it is `true`.
pub trait Automation: Send + Sync {
    fn name(&self) -> &str;
    fn cadence(&self) -> Cadence;
    fn run(&self, ctx: &AutomationContext<'_>) -> bool;
}

/// Build the enabled automations from config, keeping their order.
pub fn from_config(configs: &[AutomationConfig]) -> Vec<Box<dyn Automation>> {
    configs
        .iter()
        .filter(|c| c.enabled)
        .map(|c| Box::new(ScriptedAutomation::new(c.clone())) as Box<dyn Automation>)
        .collect()
}

// ---------------------------------------------------------------------------
// ScriptedAutomation
// ---------------------------------------------------------------------------

/// Automation driven by a list of configured [`Step`]s.
#[derive(Debug, Clone)]
pub struct ScriptedAutomation {
    config: AutomationConfig,
}

impl ScriptedAutomation {
    pub fn new(config: AutomationConfig) -> Self {
        Self { config }
    }

    fn click(ctx: &AutomationContext<'_>, point: Point, delay: Duration) -> bool {
        ctx.device.click(point.x, point.y, delay)
    }

    fn dismiss(ctx: &AutomationContext<'_>, count: u32) -> bool {
        for _ in 0..count {
            if !ctx.device.send_dismiss() {
                return false;
            }
            if !ctx.cancel.sleep(ctx.dismiss_settle) {
                return false;
            }
        }
        true
    }

    fn execute(&self, ctx: &AutomationContext<'_>, index: usize, step: &Step) -> bool {
        match step {
            Step::Click {
                point,
                times,
                delay_ms,
            } => {
                let delay = delay_ms.map(Duration::from_millis).unwrap_or(ctx.click_delay);
                for _ in 0..*times {
                    if ctx.cancel.is_cancelled() || !Self::click(ctx, *point, delay) {
                        return false;
                    }
                }
                true
            }
            Step::Swipe {
                from,
                to,
                duration_ms,
            } => ctx.device.swipe(*from, *to, Duration::from_millis(*duration_ms)),
            Step::Dismiss { count } => Self::dismiss(ctx, *count),
            Step::Wait { ms } => ctx.cancel.sleep(Duration::from_millis(*ms)),
            Step::TapText {
                keywords,
                region,
                offset,
                fallback,
                required,
            } => {
                let target = match ctx.detector.detect_position(keywords, *region) {
                    Some(found) => {
                        let shift = offset.unwrap_or(Point::new(0, 0));
                        Some(Point::new(found.x + shift.x, found.y + shift.y))
                    }
                    None => {
                        if fallback.is_some() {
                            debug!(task = self.name(), step = index, ?keywords, "text not found, using fallback");
                        }
                        *fallback
                    }
                };
                match target {
                    Some(point) => Self::click(ctx, point, ctx.click_delay),
                    None if *required => {
                        warn!(task = self.name(), step = index, ?keywords, "required text not found");
                        false
                    }
                    None => {
                        debug!(task = self.name(), step = index, ?keywords, "optional text not found, skipping");
                        true
                    }
                }
            }
            Step::ExpectText { keywords, region } => {
                let present = ctx.detector.detect_presence(keywords, *region);
                if !present {
                    warn!(task = self.name(), step = index, ?keywords, "expected text missing");
                }
                present
            }
            Step::NavigateToMap => {
                if ctx.classifier.classify() == ScreenState::MapScreen {
                    true
                } else {
                    Self::click(ctx, ctx.map_button, ctx.click_delay)
                }
            }
        }
    }
}

impl Automation for ScriptedAutomation {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn cadence(&self) -> Cadence {
        self.config.cadence
    }

    fn run(&self, ctx: &AutomationContext<'_>) -> bool {
        info!(entity = ctx.entity, task = self.name(), "subtask starting");
        for (index, step) in self.config.steps.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                info!(entity = ctx.entity, task = self.name(), step = index, "subtask stopped");
                return false;
            }
            if !self.execute(ctx, index, step) {
                warn!(entity = ctx.entity, task = self.name(), step = index, "subtask step failed");
                return false;
            }
        }
        info!(entity = ctx.entity, task = self.name(), "subtask finished");
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
