use futures_util::future::BoxFuture;
use reqwest::header::AUTHORIZATION;
use tracing::info;

use super::{ActionError, DeathAction};

/// Asks the process supervisor ("nanny") to restart the monitored server.
pub struct RestartAction {
    client: reqwest::Client,
    url: String,
    auth: Option<String>,
}

impl RestartAction {
    pub fn new(client: reqwest::Client, url: String, auth: Option<String>) -> Self {
        Self { client, url, auth }
    }

    async fn restart(&self) -> Result<(), ActionError> {
        info!("Restarting server via {}", self.url);

        let mut request = self.client.post(&self.url);
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ActionError::Status(response.status()));
        }

        info!("Restart accepted by supervisor");
        Ok(())
    }
}

impl DeathAction for RestartAction {
    fn name(&self) -> &str {
        "restart"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), ActionError>> {
        Box::pin(self.restart())
    }
}
