//! Heartbeat watchdog.
//!
//! A monitored process calls `POST /heartbeat` periodically. When the calls
//! stop for longer than the configured delay, the detection loop runs the
//! registered death actions once, then leaves monitoring chilled until the
//! next heartbeat or an explicit unchill.

pub mod actions;
pub mod config;
pub mod handlers;
pub mod models;
pub mod state;
pub mod utils;
