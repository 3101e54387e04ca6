//! Persistence seam for the alert pipeline.
//!
//! The engine never talks to Postgres directly. Everything it needs is
//! behind [`AlertStore`], with a production implementation over the
//! database repositories and an in-memory implementation for tests.

mod memory;
mod postgres;

pub use memory::{AttemptRecord, MemoryAlertStore};
pub use postgres::PgAlertStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use flipscout_core::types::{DbId, Timestamp};
use flipscout_core::{AlertRule, NotificationPayload, NotificationPreferences};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of an atomic trigger reservation.
///
/// `Proceed` means the (rule, deal) pair was recorded and the user's daily
/// counter was bumped, both in one transaction. The suppression outcomes
/// leave no state behind: a rate-capped match is not remembered as
/// triggered, so it competes again on a later day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReservation {
    Proceed,
    Duplicate,
    RateCapped,
}

/// Everything the matching pass needs: enabled rules of active users plus
/// the notification preferences of every rule owner.
#[derive(Debug, Default)]
pub struct MatchTargets {
    pub rules: Vec<AlertRule>,
    pub prefs: HashMap<DbId, NotificationPreferences>,
}

/// Input for a new notification attempt row.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: DbId,
    pub rule_id: Option<DbId>,
    pub channel: flipscout_core::ChannelKind,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Pending,
    Sent,
    Failed,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Load the matching targets for one batch evaluation.
    ///
    /// Preferences are returned for every rule owner, falling back to the
    /// defaults for users who never saved a row.
    async fn load_targets(&self) -> Result<MatchTargets, StoreError>;

    /// Load preferences for the given users, with the same default
    /// fallback as [`AlertStore::load_targets`].
    async fn load_preferences(
        &self,
        user_ids: &[DbId],
    ) -> Result<HashMap<DbId, NotificationPreferences>, StoreError>;

    /// Atomically reserve a trigger: record the (rule, deal) dedup key and
    /// consume one slot of the user's daily cap, or report why not.
    async fn reserve_trigger(
        &self,
        rule_id: DbId,
        deal_id: &str,
        user_id: DbId,
        day: NaiveDate,
        max_per_day: i32,
    ) -> Result<TriggerReservation, StoreError>;

    /// Stamp the rule's `last_triggered_at`.
    async fn touch_last_triggered(&self, rule_id: DbId, at: Timestamp) -> Result<(), StoreError>;

    /// Record a pending notification attempt and return its id.
    async fn create_attempt(&self, attempt: NewAttempt) -> Result<DbId, StoreError>;

    async fn mark_attempt_sent(&self, attempt_id: DbId, retries: i16) -> Result<(), StoreError>;

    async fn mark_attempt_failed(
        &self,
        attempt_id: DbId,
        retries: i16,
        error: &str,
    ) -> Result<(), StoreError>;
}
