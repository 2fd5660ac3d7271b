use futures_util::future::BoxFuture;
use tracing::info;

use super::{ActionError, DeathAction};
use crate::models::HeartbeatLost;
use crate::state::SharedState;

/// Tells the webhook receiver that the heartbeat was lost.
pub struct WebhookAction {
    client: reqwest::Client,
    url: String,
    realm: String,
    state: SharedState,
}

impl WebhookAction {
    pub fn new(client: reqwest::Client, base_url: &str, realm: String, state: SharedState) -> Self {
        let url = format!("{}/heartbeat-lost", base_url.trim_end_matches('/'));
        Self {
            client,
            url,
            realm,
            state,
        }
    }

    async fn notify(&self) -> Result<(), ActionError> {
        let payload = HeartbeatLost {
            realm: self.realm.clone(),
            last_heartbeat: self.state.heartbeat_lost_at(),
        };
        info!("Posting heartbeat loss to {}", self.url);

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(ActionError::Status(response.status()));
        }
        Ok(())
    }
}

impl DeathAction for WebhookAction {
    fn name(&self) -> &str {
        "webhook"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), ActionError>> {
        Box::pin(self.notify())
    }
}
