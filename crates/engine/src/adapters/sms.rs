//! SMS delivery through a Twilio-compatible REST API.
//!
//! The target is the user's verified phone number; the dispatcher refuses
//! to hand over unverified numbers.

use async_trait::async_trait;
use flipscout_core::{ChannelKind, NotificationPayload};

use super::{AdapterError, ChannelAdapter};

/// Default API base when `SMS_API_BASE` is not set.
const DEFAULT_API_BASE: &str = "https://api.twilio.com";

// ---------------------------------------------------------------------------
// SmsConfig
// ---------------------------------------------------------------------------

/// Configuration for the SMS channel.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    /// Account identifier, used in the API path and as the auth username.
    pub account_sid: String,
    /// API auth token.
    pub auth_token: String,
    /// E.164 number messages are sent from.
    pub from_number: String,
    /// API base URL, overridable for compatible providers and tests.
    pub api_base: String,
}

impl SmsConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless all three required variables are set.
    ///
    /// | Variable          | Required | Default                   |
    /// |-------------------|----------|---------------------------|
    /// | `SMS_ACCOUNT_SID` | yes      | —                         |
    /// | `SMS_AUTH_TOKEN`  | yes      | —                         |
    /// | `SMS_FROM_NUMBER` | yes      | —                         |
    /// | `SMS_API_BASE`    | no       | `https://api.twilio.com`  |
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("SMS_ACCOUNT_SID").ok()?;
        let auth_token = std::env::var("SMS_AUTH_TOKEN").ok()?;
        let from_number = std::env::var("SMS_FROM_NUMBER").ok()?;
        Some(Self {
            account_sid,
            auth_token,
            from_number,
            api_base: std::env::var("SMS_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

// ---------------------------------------------------------------------------
// SmsAdapter
// ---------------------------------------------------------------------------

/// Sends alert texts through the configured SMS provider.
pub struct SmsAdapter {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsAdapter {
    pub fn new(client: reqwest::Client, config: SmsConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, target: &str, payload: &NotificationPayload) -> Result<(), AdapterError> {
        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", target),
                ("From", self.config.from_number.as_str()),
                ("Body", payload.short_text().as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::from_status(response.status()));
        }

        tracing::debug!(to = target, "Alert SMS sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_account_sid() {
        std::env::remove_var("SMS_ACCOUNT_SID");
        assert!(SmsConfig::from_env().is_none());
    }

    #[test]
    fn messages_url_embeds_base_and_account() {
        let config = SmsConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_number: "+15550100".to_string(),
            api_base: "https://sms.example.com".to_string(),
        };
        assert_eq!(
            config.messages_url(),
            "https://sms.example.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
