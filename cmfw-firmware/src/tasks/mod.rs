//! Embassy async tasks
//!
//! The power task owns the board; other tasks only see what it publishes
//! through the signals in `channels`.

pub mod monitor;
pub mod power;

pub use monitor::monitor_task;
pub use power::power_task;
