//! Mobile push delivery through an HTTP push gateway.
//!
//! The target is the device token registered on the user's preferences.

use async_trait::async_trait;
use flipscout_core::{ChannelKind, NotificationPayload};

use super::{AdapterError, ChannelAdapter};

// ---------------------------------------------------------------------------
// PushConfig
// ---------------------------------------------------------------------------

/// Configuration for the push channel.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Gateway endpoint push requests are POSTed to.
    pub gateway_url: String,
    /// Optional bearer token for the gateway.
    pub api_key: Option<String>,
}

impl PushConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `PUSH_GATEWAY_URL` is not set.
    ///
    /// | Variable           | Required | Default |
    /// |--------------------|----------|---------|
    /// | `PUSH_GATEWAY_URL` | yes      | —       |
    /// | `PUSH_API_KEY`     | no       | —       |
    pub fn from_env() -> Option<Self> {
        let gateway_url = std::env::var("PUSH_GATEWAY_URL").ok()?;
        Some(Self {
            gateway_url,
            api_key: std::env::var("PUSH_API_KEY").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// PushAdapter
// ---------------------------------------------------------------------------

/// Sends push notifications through the configured gateway.
pub struct PushAdapter {
    client: reqwest::Client,
    config: PushConfig,
}

impl PushAdapter {
    pub fn new(client: reqwest::Client, config: PushConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ChannelAdapter for PushAdapter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(&self, target: &str, payload: &NotificationPayload) -> Result<(), AdapterError> {
        let body = serde_json::json!({
            "to": target,
            "title": payload.subject(),
            "body": payload.short_text(),
            "data": { "deal_count": payload.deal_count() },
        });

        let mut request = self.client.post(&self.config.gateway_url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::from_status(response.status()));
        }

        tracing::debug!("Alert push notification sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
