//! Observation, input and recovery machinery for driving the game UI.
//!
//! The capability traits in [`device`] and [`detector`] are the only place
//! this crate touches the outside world; everything else (classification,
//! recovery, retries) is written against them so it can be exercised with
//! scripted fakes.

pub mod cancel;
pub mod classifier;
pub mod command;
pub mod detector;
pub mod device;
pub mod recovery;
pub mod retry;

pub use cancel::CancelToken;
pub use classifier::{Classify, ScreenClassifier};
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use detector::{DetectorError, TesseractDetector, TextDetector};
pub use device::{AdbDevice, DeviceError, InputDevice, Screenshot};
pub use recovery::{Recover, RecoveryStateMachine, RecoveryTimings};
pub use retry::RetryPolicy;
