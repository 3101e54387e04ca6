//! Repository for the `notification_attempts` table.

use sqlx::PgPool;

use flipscout_core::types::DbId;

use crate::models::attempt::{AttemptRow, NewAttempt};

/// Column list for `notification_attempts` queries.
const COLUMNS: &str = "\
    id, user_id, rule_id, channel, payload, status, retries, error, \
    created_at, sent_at";

/// Provides lifecycle operations for notification attempts.
pub struct AttemptRepo;

impl AttemptRepo {
    /// Insert a pending attempt, returning its id.
    pub async fn create(pool: &PgPool, attempt: &NewAttempt) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notification_attempts (user_id, rule_id, channel, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(attempt.user_id)
        .bind(attempt.rule_id)
        .bind(&attempt.channel)
        .bind(&attempt.payload)
        .fetch_one(pool)
        .await
    }

    /// Mark an attempt delivered.
    pub async fn mark_sent(pool: &PgPool, attempt_id: DbId, retries: i16) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notification_attempts \
             SET status = 'sent', retries = $2, sent_at = NOW() \
             WHERE id = $1",
        )
        .bind(attempt_id)
        .bind(retries)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark an attempt failed, preserving the final error detail.
    pub async fn mark_failed(
        pool: &PgPool,
        attempt_id: DbId,
        retries: i16,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notification_attempts \
             SET status = 'failed', retries = $2, error = $3 \
             WHERE id = $1",
        )
        .bind(attempt_id)
        .bind(retries)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// A user's most recent attempts, newest first.
    pub async fn list_recent_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<AttemptRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_attempts \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, AttemptRow>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
