use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::actions::ActionError;

static VERBOSE_LOGGING: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

pub fn setup_logger() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_env_filter(env_filter)
        .init();

    info!("Logger initialized");
}

/// Heartbeats arrive every few seconds; only log each one when asked to.
pub fn set_verbose_logging(enabled: bool) {
    VERBOSE_LOGGING.store(enabled, Ordering::Relaxed);
    info!("Verbose logging {}", if enabled { "enabled" } else { "disabled" });
}

pub fn log_heartbeat(unchilled: bool) {
    if VERBOSE_LOGGING.load(Ordering::Relaxed) {
        info!("Received heartbeat");
    }
    if !unchilled {
        debug!("Heartbeat recorded while death actions run, gate stays chilled");
    }
}

pub fn log_chill_request(chill: bool, applied: bool) {
    let what = if chill { "chill" } else { "unchill" };
    if applied {
        info!("Received {} request", what);
    } else {
        warn!("Ignored {} request, death actions in progress", what);
    }
}

pub fn log_death_detected(threshold: Duration, actions: usize) {
    error!(
        "No heartbeat for more than {:?}, server considered dead; running {} death action(s)",
        threshold, actions
    );
}

pub fn log_action_finished(name: &str) {
    info!("Death action {} finished", name);
}

pub fn log_action_failed(name: &str, err: &ActionError) {
    error!("Death action {} failed: {}", name, err);
}
