use std::sync::Arc;

pub mod watchdog;

pub use watchdog::{GateLock, WatchdogState};

pub type SharedState = Arc<WatchdogState>;
