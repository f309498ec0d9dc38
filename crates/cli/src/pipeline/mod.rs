//! Relay orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Relay, RelayOptions};
pub use stats::RelayStats;
