//! Unattended cycle runner for auto-kingdom.
//!
//! - [`orchestrator`]: walks an instance's entities in order, with retries and
//!   a per-entity bulkhead
//! - [`automation`]: scripted per-entity subtasks
//! - [`session`]: one end-to-end run against one emulator instance
//! - [`launcher`]: one OS thread per running instance
//! - [`daemon`]: the schedule-driven polling loop behind the `ak-daemon` binary

pub mod automation;
pub mod daemon;
pub mod launcher;
pub mod orchestrator;
pub mod session;
