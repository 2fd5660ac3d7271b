//! Death actions: what the watchdog does once the monitored process is
//! declared dead.
//!
//! The detection loop only sees the [`DeathAction`] trait. Concrete actions
//! handle their own I/O and report failure through [`ActionError`], which
//! the registry logs and swallows.

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::warn;

use crate::config::WatchdogConfig;
use crate::state::SharedState;

pub mod registry;
pub mod restart;
pub mod webhook;

pub use registry::{ActionRegistry, RunSummary};
pub use restart::RestartAction;
pub use webhook::WebhookAction;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response status {0}")]
    Status(reqwest::StatusCode),
    #[error("action panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Other(String),
}

pub trait DeathAction: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self) -> BoxFuture<'_, Result<(), ActionError>>;
}

/// Adapts an async closure into a [`DeathAction`].
pub struct FnAction<F> {
    name: String,
    f: F,
}

pub fn fn_action<F, Fut>(name: impl Into<String>, f: F) -> FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    FnAction {
        name: name.into(),
        f,
    }
}

impl<F, Fut> DeathAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> BoxFuture<'_, Result<(), ActionError>> {
        Box::pin((self.f)())
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Restart first, then notify. Actions without a configured URL are skipped.
pub fn build_registry(config: &WatchdogConfig, state: &SharedState) -> ActionRegistry {
    let client = http_client();
    let mut registry = ActionRegistry::new();

    match &config.nanny_restart_url {
        Some(url) => registry.register(RestartAction::new(
            client.clone(),
            url.clone(),
            config.nanny_auth.clone(),
        )),
        None => warn!("nanny-restart-url not set, dead server will not be restarted"),
    }

    match &config.webhooker_url {
        Some(url) => registry.register(WebhookAction::new(
            client,
            url,
            config.server_name.clone(),
            state.clone(),
        )),
        None => warn!("webhooker-url not set, heartbeat loss will not be reported"),
    }

    registry
}
