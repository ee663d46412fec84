use std::sync::Arc;

use ak_core::config::{ProbeConfig, ScreensConfig};
use ak_core::types::ScreenState;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::detector::TextDetector;

/// Anything that can tell which screen is showing.
pub trait Classify: Send + Sync {
    fn classify(&self) -> ScreenState;
}

/// Probe order. Screens share keywords, so the most specific checks run
/// first: the login prompt overlays everything, the alliance menu shows the
/// bottom bar too, and the bottom bar alone means some dialog is open.
const PRIORITY: [ScreenState; 5] = [
    ScreenState::CharacterLogin,
    ScreenState::AllianceMenu,
    ScreenState::HomeVillage,
    ScreenState::MapScreen,
    ScreenState::DialogOpen,
];

/// First-match classifier over a fixed, ordered probe table.
pub struct ScreenClassifier {
    detector: Arc<dyn TextDetector>,
    probes: Vec<(ScreenState, ProbeConfig)>,
    cancel: CancelToken,
}

impl ScreenClassifier {
    pub fn new(detector: Arc<dyn TextDetector>, screens: &ScreensConfig, cancel: CancelToken) -> Self {
        let probes = PRIORITY
            .iter()
            .filter_map(|state| screens.probe_for(*state).map(|p| (*state, p.clone())))
            .collect();
        let classifier = Self {
            detector,
            probes,
            cancel,
        };
        debug!(order = ?classifier.probe_order().collect::<Vec<_>>(), "screen classifier ready");
        classifier
    }

    /// States in the order they are probed.
    pub fn probe_order(&self) -> impl Iterator<Item = ScreenState> + '_ {
        self.probes.iter().map(|(state, _)| *state)
    }
}

impl Classify for ScreenClassifier {
    /// Returns `Unknown` when nothing matches or when a stop was requested
    /// before or during a probe.
    fn classify(&self) -> ScreenState {
        for (state, probe) in &self.probes {
            if self.cancel.is_cancelled() {
                debug!("classification interrupted by stop request");
                return ScreenState::Unknown;
            }
            let present = self.detector.detect_presence(&probe.keywords, probe.region);
            if self.cancel.is_cancelled() {
                debug!(state = %state, "probe finished after stop request, result discarded");
                return ScreenState::Unknown;
            }
            if present {
                debug!(state = %state, "screen classified");
                return *state;
            }
        }
        debug!(state = %ScreenState::Unknown, "screen classified");
        ScreenState::Unknown
    }
}
