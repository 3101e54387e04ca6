//! Discord delivery via per-user webhooks.
//!
//! The target is the webhook URL stored on the user's preferences, so the
//! adapter itself needs no configuration beyond an HTTP client.

use async_trait::async_trait;
use flipscout_core::{ChannelKind, NotificationPayload};

use super::{AdapterError, ChannelAdapter};

/// Discord rejects message content over 2000 characters; truncate with
/// some headroom.
const CONTENT_LIMIT: usize = 1900;

/// Posts alert messages to Discord webhooks.
pub struct DiscordAdapter {
    client: reqwest::Client,
}

impl DiscordAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn render_content(payload: &NotificationPayload) -> String {
    let content = format!("**{}**\n{}", payload.subject(), payload.body_text());
    if content.chars().count() > CONTENT_LIMIT {
        content.chars().take(CONTENT_LIMIT).collect()
    } else {
        content
    }
}

#[async_trait]
impl ChannelAdapter for DiscordAdapter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Discord
    }

    async fn send(&self, target: &str, payload: &NotificationPayload) -> Result<(), AdapterError> {
        let body = serde_json::json!({ "content": render_content(payload) });

        let response = self.client.post(target).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::from_status(response.status()));
        }

        tracing::debug!("Alert posted to Discord webhook");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
