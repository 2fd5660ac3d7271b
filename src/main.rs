use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use heartbeat_watchdog::actions::build_registry;
use heartbeat_watchdog::config::WatchdogConfig;
use heartbeat_watchdog::handlers::{routes, start_detection_task};
use heartbeat_watchdog::state::{SharedState, WatchdogState};
use heartbeat_watchdog::utils::clock::SystemClock;
use heartbeat_watchdog::utils::logger::{set_verbose_logging, setup_logger};

#[tokio::main]
async fn main() {
    setup_logger();

    let config = WatchdogConfig::load();
    set_verbose_logging(config.verbose);
    info!(
        "Heartbeat delay {:?}, check interval {:?}",
        config.acceptable_heartbeat_delay, config.check_interval
    );

    // Monitoring starts chilled until the first heartbeat
    let state: SharedState = Arc::new(WatchdogState::new(
        Arc::new(SystemClock),
        config.acceptable_heartbeat_delay,
    ));

    // Actions are fixed before the loop starts
    let registry = Arc::new(build_registry(&config, &state));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let detection = tokio::spawn(start_detection_task(
        state.clone(),
        registry,
        config.check_interval,
        shutdown_rx,
    ));

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
        let _ = shutdown_tx.send(true);
    };

    match warp::serve(routes(state)).try_bind_with_graceful_shutdown(config.address, shutdown_signal) {
        Ok((addr, server)) => {
            info!("Listening on {}", addr);
            server.await;
        }
        Err(e) => {
            error!("Failed to bind {}: {}", config.address, e);
            std::process::exit(1);
        }
    }

    if let Err(e) = detection.await {
        error!("Detection loop ended abnormally: {}", e);
    }
}
