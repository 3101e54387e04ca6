//! Channel adapters: one per delivery channel.
//!
//! An adapter knows how to push one rendered payload to one target over
//! its protocol. Retry, attempt bookkeeping, and target resolution live in
//! the dispatcher; adapters only classify their failures as worth
//! retrying or not.

pub mod discord;
pub mod email;
pub mod push;
pub mod sms;

pub use discord::DiscordAdapter;
pub use email::{EmailAdapter, SmtpConfig};
pub use push::{PushAdapter, PushConfig};
pub use sms::{SmsAdapter, SmsConfig};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flipscout_core::{ChannelKind, NotificationPayload};

/// HTTP request timeout for a single delivery attempt.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for channel delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The attempt failed in a way a retry may fix (network trouble,
    /// timeouts, HTTP 5xx, rate limiting).
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The attempt is broken as posed; retrying would repeat the failure.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl AdapterError {
    /// Whether the dispatcher should retry after this error.
    pub fn retryable(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }

    /// Classify a non-2xx HTTP response: 5xx and 429 are worth retrying,
    /// the rest are not.
    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            AdapterError::Transient(format!("HTTP {status}"))
        } else {
            AdapterError::Permanent(format!("HTTP {status}"))
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    /// Network-level failures (DNS, connect, timeout) are all transient.
    fn from(e: reqwest::Error) -> Self {
        AdapterError::Transient(format!("HTTP request failed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// ChannelAdapter
// ---------------------------------------------------------------------------

/// One delivery protocol.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn kind(&self) -> ChannelKind;

    /// Deliver one payload to the resolved target. The target's meaning
    /// depends on the channel: an email address, a webhook URL, a phone
    /// number, or a device token.
    async fn send(&self, target: &str, payload: &NotificationPayload) -> Result<(), AdapterError>;
}

// ---------------------------------------------------------------------------
// AdapterSet
// ---------------------------------------------------------------------------

/// The adapters the dispatcher can reach, keyed by channel.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ChannelKind, Arc<dyn ChannelAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the set from environment configuration.
    ///
    /// Channels without configuration are simply absent from the set;
    /// dispatching to them records a failed attempt without retrying.
    /// Discord needs no process-level configuration because the webhook
    /// URL lives on each user's preferences.
    pub fn from_env() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");

        let mut set = Self::new().with(Arc::new(DiscordAdapter::new(client.clone())));
        if let Some(config) = SmtpConfig::from_env() {
            set = set.with(Arc::new(EmailAdapter::new(config)));
        }
        if let Some(config) = SmsConfig::from_env() {
            set = set.with(Arc::new(SmsAdapter::new(client.clone(), config)));
        }
        if let Some(config) = PushConfig::from_env() {
            set = set.with(Arc::new(PushAdapter::new(client, config)));
        }
        set
    }

    pub fn with(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.get(&kind)
    }

    /// Configured channels, in dispatch order.
    pub fn configured(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
