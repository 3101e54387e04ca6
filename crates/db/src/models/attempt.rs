//! Notification attempt entity model.

use serde::Serialize;
use sqlx::FromRow;

use flipscout_core::types::{DbId, Timestamp};

/// `notification_attempts.status` values.
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_FAILED: &str = "failed";

/// A row from the `notification_attempts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptRow {
    pub id: DbId,
    pub user_id: DbId,
    pub rule_id: Option<DbId>,
    pub channel: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub retries: i16,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub sent_at: Option<Timestamp>,
}

/// Insert shape for a new (pending) attempt.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: DbId,
    pub rule_id: Option<DbId>,
    pub channel: String,
    pub payload: serde_json::Value,
}
