//! Channel dispatch with retry and attempt bookkeeping.
//!
//! Every dispatch records a `notification_attempts` row before the first
//! send, then marks it sent or failed once the retry schedule is
//! exhausted. Channels are independent: one channel failing never stops
//! another from delivering.

use std::sync::Arc;
use std::time::Duration;

use flipscout_core::types::DbId;
use flipscout_core::{ChannelKind, NotificationPayload, NotificationPreferences};

use crate::adapters::AdapterSet;
use crate::store::{AlertStore, NewAttempt};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Backoff schedule between delivery attempts. The number of delays bounds
/// the retry count, so an empty schedule means a single attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Same retry count as the default schedule but without the waiting,
    /// so tests run at full speed.
    pub fn no_backoff() -> Self {
        Self {
            delays: vec![Duration::ZERO; RETRY_DELAYS_SECS.len()],
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

/// What happened on one channel.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub channel: ChannelKind,
    /// Attempt row id; `None` when even the bookkeeping insert failed.
    pub attempt_id: Option<DbId>,
    pub sent: bool,
    /// Retries performed (attempts minus one).
    pub retries: i16,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// ChannelDispatcher
// ---------------------------------------------------------------------------

/// Fans one payload out to the user's channels.
pub struct ChannelDispatcher {
    store: Arc<dyn AlertStore>,
    adapters: AdapterSet,
    retry: RetryPolicy,
}

impl ChannelDispatcher {
    pub fn new(store: Arc<dyn AlertStore>, adapters: AdapterSet) -> Self {
        Self {
            store,
            adapters,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Dispatch one payload across the requested channels.
    ///
    /// Only channels the user has enabled are attempted; the rest are
    /// skipped silently. Channels run concurrently and fail independently.
    /// The returned outcomes cover every attempted channel.
    pub async fn dispatch(
        &self,
        prefs: &NotificationPreferences,
        channels: &[ChannelKind],
        rule_id: Option<DbId>,
        payload: &NotificationPayload,
    ) -> Vec<DispatchOutcome> {
        let selected: Vec<ChannelKind> = channels
            .iter()
            .copied()
            .filter(|ch| prefs.channel_enabled(*ch))
            .collect();
        if selected.is_empty() {
            tracing::debug!(user_id = prefs.user_id, "No enabled channels for dispatch");
            return Vec::new();
        }

        futures::future::join_all(
            selected
                .into_iter()
                .map(|channel| self.deliver_on(channel, prefs, rule_id, payload)),
        )
        .await
    }

    /// Send a test payload through one channel and report the outcome.
    ///
    /// Records a normal attempt row but performs exactly one send, with no
    /// retries and none of the trigger or rate-cap bookkeeping.
    pub async fn test_channel(
        &self,
        prefs: &NotificationPreferences,
        channel: ChannelKind,
        payload: &NotificationPayload,
    ) -> DispatchOutcome {
        let attempt_id = match self
            .record_attempt(prefs.user_id, None, channel, payload)
            .await
        {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };

        let result = match self.adapters.get(channel) {
            None => Err(format!("Channel '{channel}' is not configured")),
            Some(adapter) => match resolve_target(prefs, channel) {
                Ok(target) => adapter
                    .send(&target, payload)
                    .await
                    .map_err(|e| e.to_string()),
                Err(reason) => Err(reason),
            },
        };

        self.finish_attempt(channel, prefs.user_id, attempt_id, 0, result)
            .await
    }

    /// Deliver on one channel: record the attempt, drive the retry loop,
    /// settle the row.
    async fn deliver_on(
        &self,
        channel: ChannelKind,
        prefs: &NotificationPreferences,
        rule_id: Option<DbId>,
        payload: &NotificationPayload,
    ) -> DispatchOutcome {
        let attempt_id = match self
            .record_attempt(prefs.user_id, rule_id, channel, payload)
            .await
        {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };

        match self.send_with_retry(channel, prefs, payload).await {
            Ok(retries) => {
                self.finish_attempt(channel, prefs.user_id, attempt_id, retries, Ok(()))
                    .await
            }
            Err((retries, reason)) => {
                self.finish_attempt(channel, prefs.user_id, attempt_id, retries, Err(reason))
                    .await
            }
        }
    }

    /// Drive one channel's adapter through the retry schedule. Returns the
    /// retry count on success, or the count and final error on failure.
    ///
    /// A missing adapter, a missing target, or a permanent adapter error
    /// fails immediately; only transient errors consume the schedule.
    async fn send_with_retry(
        &self,
        channel: ChannelKind,
        prefs: &NotificationPreferences,
        payload: &NotificationPayload,
    ) -> Result<i16, (i16, String)> {
        let Some(adapter) = self.adapters.get(channel) else {
            return Err((0, format!("Channel '{channel}' is not configured")));
        };
        let target = resolve_target(prefs, channel).map_err(|reason| (0, reason))?;

        let mut retries: i16 = 0;
        for delay in &self.retry.delays {
            match adapter.send(&target, payload).await {
                Ok(()) => return Ok(retries),
                Err(e) if e.retryable() => {
                    tracing::warn!(
                        channel = %channel,
                        attempt = retries + 1,
                        error = %e,
                        "Delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                    retries += 1;
                }
                Err(e) => return Err((retries, e.to_string())),
            }
        }

        // Final attempt after the last backoff.
        match adapter.send(&target, payload).await {
            Ok(()) => Ok(retries),
            Err(e) => Err((retries, e.to_string())),
        }
    }

    async fn record_attempt(
        &self,
        user_id: DbId,
        rule_id: Option<DbId>,
        channel: ChannelKind,
        payload: &NotificationPayload,
    ) -> Result<DbId, DispatchOutcome> {
        match self
            .store
            .create_attempt(NewAttempt {
                user_id,
                rule_id,
                channel,
                payload: payload.clone(),
            })
            .await
        {
            Ok(id) => Ok(id),
            Err(e) => {
                tracing::error!(
                    user_id,
                    channel = %channel,
                    error = %e,
                    "Failed to record notification attempt"
                );
                Err(DispatchOutcome {
                    channel,
                    attempt_id: None,
                    sent: false,
                    retries: 0,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn finish_attempt(
        &self,
        channel: ChannelKind,
        user_id: DbId,
        attempt_id: DbId,
        retries: i16,
        result: Result<(), String>,
    ) -> DispatchOutcome {
        match result {
            Ok(()) => {
                if let Err(e) = self.store.mark_attempt_sent(attempt_id, retries).await {
                    tracing::error!(attempt_id, error = %e, "Failed to mark attempt sent");
                }
                tracing::info!(
                    user_id,
                    channel = %channel,
                    attempt_id,
                    retries,
                    "Notification delivered"
                );
                DispatchOutcome {
                    channel,
                    attempt_id: Some(attempt_id),
                    sent: true,
                    retries,
                    error: None,
                }
            }
            Err(reason) => {
                if let Err(e) = self
                    .store
                    .mark_attempt_failed(attempt_id, retries, &reason)
                    .await
                {
                    tracing::error!(attempt_id, error = %e, "Failed to mark attempt failed");
                }
                tracing::warn!(
                    user_id,
                    channel = %channel,
                    attempt_id,
                    retries,
                    error = %reason,
                    "Notification delivery failed"
                );
                DispatchOutcome {
                    channel,
                    attempt_id: Some(attempt_id),
                    sent: false,
                    retries,
                    error: Some(reason),
                }
            }
        }
    }
}

/// Pull the channel's delivery target off the user's preferences.
///
/// Target problems are configuration errors: they fail the dispatch
/// without ever invoking the adapter, so they are never retried.
fn resolve_target(prefs: &NotificationPreferences, channel: ChannelKind) -> Result<String, String> {
    match channel {
        ChannelKind::Email => prefs
            .email
            .clone()
            .ok_or_else(|| "No email address on preferences".to_string()),
        ChannelKind::Discord => prefs
            .discord_webhook_url
            .clone()
            .ok_or_else(|| "No Discord webhook URL on preferences".to_string()),
        ChannelKind::Sms => {
            let number = prefs
                .phone_number
                .clone()
                .ok_or_else(|| "No phone number on preferences".to_string())?;
            if !prefs.phone_verified {
                return Err("Phone number is not verified".to_string());
            }
            Ok(number)
        }
        ChannelKind::Push => prefs
            .push_token
            .clone()
            .ok_or_else(|| "No push device token registered".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedAdapter;
    use crate::adapters::AdapterError;
    use crate::store::{AttemptStatus, MemoryAlertStore};
    use flipscout_core::{Condition, DealSummary};

    fn payload() -> NotificationPayload {
        NotificationPayload::single(DealSummary {
            deal_id: "d1".into(),
            title: "Thinkpad X1".into(),
            price: 400.0,
            condition: Condition::Great,
            category: "electronics".into(),
            deal_score: 0.9,
            rule_name: "laptops".into(),
        })
    }

    fn full_prefs(user_id: DbId) -> NotificationPreferences {
        let mut p = NotificationPreferences::default_for(user_id);
        p.channels = vec![
            ChannelKind::Email,
            ChannelKind::Discord,
            ChannelKind::Sms,
            ChannelKind::Push,
        ];
        p.email = Some("user@example.com".to_string());
        p.discord_webhook_url = Some("https://discord.example/hook".to_string());
        p.phone_number = Some("+15550100".to_string());
        p.phone_verified = true;
        p.push_token = Some("device-token".to_string());
        p
    }

    fn dispatcher(
        store: Arc<MemoryAlertStore>,
        adapters: AdapterSet,
    ) -> ChannelDispatcher {
        ChannelDispatcher::new(store, adapters).with_retry_policy(RetryPolicy::no_backoff())
    }

    // -- channel selection ----------------------------------------------------

    #[tokio::test]
    async fn dispatch_reaches_every_enabled_channel() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let discord = Arc::new(ScriptedAdapter::ok(ChannelKind::Discord));
        let set = AdapterSet::new().with(email.clone()).with(discord.clone());
        let d = dispatcher(store.clone(), set);

        let outcomes = d
            .dispatch(
                &full_prefs(1),
                &[ChannelKind::Email, ChannelKind::Discord],
                Some(5),
                &payload(),
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.sent));
        assert_eq!(email.targets(), vec!["user@example.com"]);
        assert_eq!(discord.targets(), vec!["https://discord.example/hook"]);

        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.status == AttemptStatus::Sent));
        assert!(attempts.iter().all(|a| a.rule_id == Some(5)));
    }

    #[tokio::test]
    async fn disabled_channels_are_skipped_without_attempts() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let discord = Arc::new(ScriptedAdapter::ok(ChannelKind::Discord));
        let set = AdapterSet::new().with(email.clone()).with(discord.clone());
        let d = dispatcher(store.clone(), set);

        let mut prefs = full_prefs(1);
        prefs.channels = vec![ChannelKind::Email];

        let outcomes = d
            .dispatch(
                &prefs,
                &[ChannelKind::Email, ChannelKind::Discord],
                None,
                &payload(),
            )
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].channel, ChannelKind::Email);
        assert_eq!(discord.call_count(), 0);
        assert_eq!(store.attempts().await.len(), 1);
    }

    // -- channel independence -------------------------------------------------

    #[tokio::test]
    async fn one_failing_channel_does_not_block_another() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::with_script(
            ChannelKind::Email,
            vec![Err(AdapterError::Permanent("mailbox gone".into()))],
        ));
        let discord = Arc::new(ScriptedAdapter::ok(ChannelKind::Discord));
        let set = AdapterSet::new().with(email).with(discord.clone());
        let d = dispatcher(store.clone(), set);

        let outcomes = d
            .dispatch(
                &full_prefs(1),
                &[ChannelKind::Email, ChannelKind::Discord],
                None,
                &payload(),
            )
            .await;

        let email_outcome = outcomes
            .iter()
            .find(|o| o.channel == ChannelKind::Email)
            .unwrap();
        let discord_outcome = outcomes
            .iter()
            .find(|o| o.channel == ChannelKind::Discord)
            .unwrap();
        assert!(!email_outcome.sent);
        assert!(discord_outcome.sent);
        assert_eq!(discord.call_count(), 1);
    }

    // -- retry schedule -------------------------------------------------------

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::with_script(
            ChannelKind::Email,
            vec![
                Err(AdapterError::Transient("timeout".into())),
                Err(AdapterError::Transient("timeout".into())),
                Ok(()),
            ],
        ));
        let set = AdapterSet::new().with(email.clone());
        let d = dispatcher(store.clone(), set);

        let outcomes = d
            .dispatch(&full_prefs(1), &[ChannelKind::Email], None, &payload())
            .await;

        assert!(outcomes[0].sent);
        assert_eq!(outcomes[0].retries, 2);
        assert_eq!(email.call_count(), 3);

        let attempts = store.attempts().await;
        assert_eq!(attempts[0].status, AttemptStatus::Sent);
        assert_eq!(attempts[0].retries, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_mark_the_attempt_failed() {
        let store = Arc::new(MemoryAlertStore::new());
        let failures: Vec<Result<(), AdapterError>> = (0..4)
            .map(|_| Err(AdapterError::Transient("connection refused".into())))
            .collect();
        let email = Arc::new(ScriptedAdapter::with_script(ChannelKind::Email, failures));
        let set = AdapterSet::new().with(email.clone());
        let d = dispatcher(store.clone(), set);

        let outcomes = d
            .dispatch(&full_prefs(1), &[ChannelKind::Email], None, &payload())
            .await;

        assert!(!outcomes[0].sent);
        // Three retries after the initial attempt.
        assert_eq!(outcomes[0].retries, 3);
        assert_eq!(email.call_count(), 4);

        let attempts = store.attempts().await;
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert!(attempts[0].error.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn permanent_failures_do_not_retry() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::with_script(
            ChannelKind::Email,
            vec![Err(AdapterError::Permanent("HTTP 404".into()))],
        ));
        let set = AdapterSet::new().with(email.clone());
        let d = dispatcher(store.clone(), set);

        let outcomes = d
            .dispatch(&full_prefs(1), &[ChannelKind::Email], None, &payload())
            .await;

        assert!(!outcomes[0].sent);
        assert_eq!(outcomes[0].retries, 0);
        assert_eq!(email.call_count(), 1);
    }

    // -- configuration errors -------------------------------------------------

    #[tokio::test]
    async fn missing_target_fails_without_calling_the_adapter() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let set = AdapterSet::new().with(email.clone());
        let d = dispatcher(store.clone(), set);

        let mut prefs = full_prefs(1);
        prefs.email = None;

        let outcomes = d
            .dispatch(&prefs, &[ChannelKind::Email], None, &payload())
            .await;

        assert!(!outcomes[0].sent);
        assert_eq!(outcomes[0].retries, 0);
        assert_eq!(email.call_count(), 0);
        assert!(outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("email address"));
    }

    #[tokio::test]
    async fn unverified_phone_blocks_sms() {
        let store = Arc::new(MemoryAlertStore::new());
        let sms = Arc::new(ScriptedAdapter::ok(ChannelKind::Sms));
        let set = AdapterSet::new().with(sms.clone());
        let d = dispatcher(store.clone(), set);

        let mut prefs = full_prefs(1);
        prefs.phone_verified = false;

        let outcomes = d
            .dispatch(&prefs, &[ChannelKind::Sms], None, &payload())
            .await;

        assert!(!outcomes[0].sent);
        assert_eq!(sms.call_count(), 0);
        assert!(outcomes[0].error.as_deref().unwrap().contains("not verified"));
    }

    #[tokio::test]
    async fn unconfigured_channel_still_records_a_failed_attempt() {
        let store = Arc::new(MemoryAlertStore::new());
        let d = dispatcher(store.clone(), AdapterSet::new());

        let outcomes = d
            .dispatch(&full_prefs(1), &[ChannelKind::Push], None, &payload())
            .await;

        assert!(!outcomes[0].sent);
        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert!(attempts[0].error.as_deref().unwrap().contains("not configured"));
    }

    // -- channel test ---------------------------------------------------------

    #[tokio::test]
    async fn test_channel_performs_exactly_one_attempt() {
        let store = Arc::new(MemoryAlertStore::new());
        let email = Arc::new(ScriptedAdapter::with_script(
            ChannelKind::Email,
            vec![Err(AdapterError::Transient("timeout".into()))],
        ));
        let set = AdapterSet::new().with(email.clone());
        let d = dispatcher(store.clone(), set);

        let outcome = d
            .test_channel(&full_prefs(1), ChannelKind::Email, &payload())
            .await;

        // Even a transient error is not retried for channel tests.
        assert!(!outcome.sent);
        assert_eq!(outcome.retries, 0);
        assert_eq!(email.call_count(), 1);

        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].rule_id, None);
    }

    #[tokio::test]
    async fn test_channel_reports_success() {
        let store = Arc::new(MemoryAlertStore::new());
        let discord = Arc::new(ScriptedAdapter::ok(ChannelKind::Discord));
        let set = AdapterSet::new().with(discord.clone());
        let d = dispatcher(store.clone(), set);

        let outcome = d
            .test_channel(&full_prefs(1), ChannelKind::Discord, &payload())
            .await;

        assert!(outcome.sent);
        assert_eq!(store.attempts().await[0].status, AttemptStatus::Sent);
    }
}
