//! # HTTP Gateway Client
//!
//! reqwest-based implementation of [`GatewayClient`].
//!
//! Authenticates with basic auth (client id / secret). Every call is
//! bounded by the configured timeout at the client level; the reconciler
//! adds its own timeout around capture as the authoritative bound.

use reqwest::Client;
use tracing::{debug, warn};

use super::{
    CreateIntentRequest, GatewayCapture, GatewayClient, GatewayError, GatewayIntent, GatewayResult,
};
use crate::config::GatewayConfig;

/// HTTP client for the payment gateway.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpGateway {
    /// Builds an HTTP gateway client from configuration.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.capture_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(HttpGateway {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> GatewayResult<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gateway returned error status");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl GatewayClient for HttpGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> GatewayResult<GatewayIntent> {
        debug!(reference = %request.reference, amount = request.amount_cents, "Creating gateway intent");

        let response = self
            .client
            .post(format!("{}/v1/intents", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::parse_response(response).await
    }

    async fn capture(&self, intent_id: &str) -> GatewayResult<GatewayCapture> {
        debug!(intent_id = %intent_id, "Capturing gateway intent");

        let response = self
            .client
            .post(format!("{}/v1/intents/{}/capture", self.base_url, intent_id))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::parse_response(response).await
    }
}
