//! Core data model, configuration and persisted stores for auto-kingdom.
//!
//! Nothing in this crate talks to a device. It holds the types shared by the
//! harness and the daemon, the TOML configuration, and the two small JSON
//! stores kept per managed instance (daily task completions and the run
//! schedule).

pub mod clock;
pub mod config;
pub mod schedule;
pub mod tracker;
pub mod types;
