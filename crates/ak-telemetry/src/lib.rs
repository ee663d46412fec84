//! Logging setup shared by the auto-kingdom binaries.
//!
//! Library crates only emit `tracing` events; the daemon and the CLI call
//! [`logging::init_logging`] once at startup to install a subscriber.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
