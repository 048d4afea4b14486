//! Webhook delivery
//!
//! One POST per event, no retries and no queue. A failed delivery is
//! reported to the caller and the event is gone.

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use th_core::config::WebhookConfig;
use th_core::{ConfigError, DeliveryError};
use th_protocol::DeliveryEnvelope;

/// Delivers envelopes to the configured webhook
///
/// Holds no per-delivery state; calling [`deliver`](Self::deliver) twice
/// with the same envelope makes two independent requests.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: Url,
}

impl WebhookDispatcher {
    /// Build a dispatcher sending with the given user agent
    pub fn new(config: &WebhookConfig, user_agent: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(&config.url)
            .map_err(|e| ConfigError::Invalid(format!("webhook.url: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url })
    }

    /// Make a single delivery attempt
    pub async fn deliver(&self, envelope: &DeliveryEnvelope) -> Result<(), DeliveryError> {
        let body =
            serde_json::to_vec(envelope).map_err(|e| DeliveryError::Serialize(e.to_string()))?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        Ok(())
    }
}
