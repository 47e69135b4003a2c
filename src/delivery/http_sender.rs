//! Sender for JSON-over-HTTP email APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::error::{DeliveryError, GatewayError, GatewayResult};
use crate::protocol::EmailCommand;

use super::EmailSender;

/// Longest slice of a provider error body kept in error messages.
const MAX_PROVIDER_MESSAGE: usize = 512;

/// Wire shape posted to the provider.
#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// POSTs each message as JSON to a provider endpoint.
///
/// A 2xx answer is a successful send. Any other status is a provider
/// rejection; it is attributed to the caller (400) only when the provider
/// says the address is unverified, otherwise it is reported as 500.
pub struct HttpEmailSender {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpEmailSender {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_token,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> GatewayResult<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            GatewayError::config("provider.endpoint is required for the http provider")
        })?;
        Self::new(
            endpoint,
            config.api_token.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, command: EmailCommand) -> Result<String, DeliveryError> {
        let message = OutgoingMessage {
            from: &command.sender,
            to: &command.recipients,
            subject: &command.subject,
            text: &command.body,
        };

        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| DeliveryError::Unexpected {
            message: format!("provider request failed: {}", e.without_url()),
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Unexpected {
                message: format!("failed to read provider response: {}", e),
            })?;

        debug!(status = status.as_u16(), "Provider responded");

        if status.is_success() {
            Ok(extract_message_id(&body))
        } else {
            Err(classify_failure(status.as_u16(), &body))
        }
    }
}

/// Pull the message id out of a provider's success body.
fn extract_message_id(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message_id", "MessageId", "id"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Map a non-2xx provider response to a delivery error.
fn classify_failure(status: u16, body: &str) -> DeliveryError {
    let detail: String = body.chars().take(MAX_PROVIDER_MESSAGE).collect();

    // Unverified addresses are the caller's mistake, not the gateway's.
    let status = if detail.to_lowercase().contains("not verified") {
        400
    } else {
        500
    };

    DeliveryError::Provider {
        status,
        message: detail,
    }
}
