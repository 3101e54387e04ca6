//! In-memory [`AlertStore`] used by the engine test suite.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use flipscout_core::types::{DbId, Timestamp};
use flipscout_core::{AlertRule, ChannelKind, NotificationPayload, NotificationPreferences};
use tokio::sync::Mutex;

use super::{AlertStore, AttemptStatus, MatchTargets, NewAttempt, StoreError, TriggerReservation};

/// A notification attempt as recorded by the memory store.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub id: DbId,
    pub user_id: DbId,
    pub rule_id: Option<DbId>,
    pub channel: ChannelKind,
    pub payload: NotificationPayload,
    pub status: AttemptStatus,
    pub retries: i16,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct TriggerState {
    /// Dedup keys: (rule_id, deal_id) pairs that already fired.
    fired: HashSet<(DbId, String)>,
    /// Notifications counted against the cap, per local day.
    sent_per_day: HashMap<NaiveDate, i32>,
}

/// Stores everything in process memory. Reservation uses one coarse lock
/// instead of a per-user lock, which keeps the same serialization
/// guarantees at test scale.
#[derive(Default)]
pub struct MemoryAlertStore {
    rules: Mutex<Vec<AlertRule>>,
    prefs: Mutex<HashMap<DbId, NotificationPreferences>>,
    triggers: Mutex<HashMap<DbId, TriggerState>>,
    attempts: Mutex<Vec<AttemptRecord>>,
    next_attempt_id: AtomicI64,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self {
            next_attempt_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    pub async fn add_rule(&self, rule: AlertRule) {
        self.rules.lock().await.push(rule);
    }

    pub async fn set_preferences(&self, prefs: NotificationPreferences) {
        self.prefs.lock().await.insert(prefs.user_id, prefs);
    }

    pub async fn rule(&self, rule_id: DbId) -> Option<AlertRule> {
        self.rules
            .lock()
            .await
            .iter()
            .find(|r| r.id == rule_id)
            .cloned()
    }

    pub async fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().await.clone()
    }

    pub async fn attempts_for(&self, user_id: DbId) -> Vec<AttemptRecord> {
        self.attempts
            .lock()
            .await
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn load_targets(&self) -> Result<MatchTargets, StoreError> {
        let rules: Vec<AlertRule> = self
            .rules
            .lock()
            .await
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect();
        let user_ids: Vec<DbId> = rules.iter().map(|r| r.user_id).collect();
        let prefs = self.load_preferences(&user_ids).await?;
        Ok(MatchTargets { rules, prefs })
    }

    async fn load_preferences(
        &self,
        user_ids: &[DbId],
    ) -> Result<HashMap<DbId, NotificationPreferences>, StoreError> {
        let stored = self.prefs.lock().await;
        let mut out = HashMap::new();
        for &user_id in user_ids {
            let prefs = stored
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| NotificationPreferences::default_for(user_id));
            out.insert(user_id, prefs);
        }
        Ok(out)
    }

    async fn reserve_trigger(
        &self,
        rule_id: DbId,
        deal_id: &str,
        user_id: DbId,
        day: NaiveDate,
        max_per_day: i32,
    ) -> Result<TriggerReservation, StoreError> {
        let mut triggers = self.triggers.lock().await;
        let state = triggers.entry(user_id).or_default();

        let key = (rule_id, deal_id.to_string());
        if state.fired.contains(&key) {
            return Ok(TriggerReservation::Duplicate);
        }

        let count = state.sent_per_day.entry(day).or_insert(0);
        if *count >= max_per_day {
            // Suppressed matches leave no dedup key behind.
            return Ok(TriggerReservation::RateCapped);
        }

        *count += 1;
        state.fired.insert(key);
        Ok(TriggerReservation::Proceed)
    }

    async fn touch_last_triggered(&self, rule_id: DbId, at: Timestamp) -> Result<(), StoreError> {
        let mut rules = self.rules.lock().await;
        if let Some(rule) = rules.iter_mut().find(|r| r.id == rule_id) {
            rule.last_triggered_at = Some(at);
        }
        Ok(())
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<DbId, StoreError> {
        let id = self.next_attempt_id.fetch_add(1, Ordering::SeqCst);
        self.attempts.lock().await.push(AttemptRecord {
            id,
            user_id: attempt.user_id,
            rule_id: attempt.rule_id,
            channel: attempt.channel,
            payload: attempt.payload,
            status: AttemptStatus::Pending,
            retries: 0,
            error: None,
        });
        Ok(id)
    }

    async fn mark_attempt_sent(&self, attempt_id: DbId, retries: i16) -> Result<(), StoreError> {
        let mut attempts = self.attempts.lock().await;
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.status = AttemptStatus::Sent;
            attempt.retries = retries;
        }
        Ok(())
    }

    async fn mark_attempt_failed(
        &self,
        attempt_id: DbId,
        retries: i16,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut attempts = self.attempts.lock().await;
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.status = AttemptStatus::Failed;
            attempt.retries = retries;
            attempt.error = Some(error.to_string());
        }
        Ok(())
    }
}
