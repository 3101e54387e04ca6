//! Repository for trigger dedup state: the `alert_triggers` ledger and the
//! `daily_notification_counts` rate counter.

use chrono::NaiveDate;
use sqlx::PgPool;

use flipscout_core::types::DbId;

/// Outcome of a trigger reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Dedup key written and daily counter bumped; dispatch may proceed.
    Reserved,
    /// This (rule, deal) pair already alerted; suppress permanently.
    DuplicateTrigger,
    /// The user's daily cap is spent. Nothing was written, so the pair
    /// may still fire on a later day.
    RateCapped,
}

/// Provides the compare-and-set reservation the engine relies on.
pub struct TriggerRepo;

impl TriggerRepo {
    /// Atomically record "this rule alerted on this deal" and consume one
    /// unit of the user's daily budget.
    ///
    /// Both writes share a transaction: the dedup insert uses
    /// `ON CONFLICT DO NOTHING` (no returned row means a concurrent or
    /// earlier reservation won), and the counter upsert only increments
    /// while under the cap (no returned row means the budget is spent, and
    /// the transaction rolls back so the dedup key is not kept).
    pub async fn reserve(
        pool: &PgPool,
        rule_id: DbId,
        deal_id: &str,
        user_id: DbId,
        day: NaiveDate,
        max_per_day: i32,
    ) -> Result<ReserveOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let inserted: Option<DbId> = sqlx::query_scalar(
            "INSERT INTO alert_triggers (rule_id, deal_id, user_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (rule_id, deal_id) DO NOTHING \
             RETURNING rule_id",
        )
        .bind(rule_id)
        .bind(deal_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            return Ok(ReserveOutcome::DuplicateTrigger);
        }

        let counted: Option<i32> = sqlx::query_scalar(
            "INSERT INTO daily_notification_counts (user_id, day, sent_count) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (user_id, day) DO UPDATE \
                SET sent_count = daily_notification_counts.sent_count + 1 \
                WHERE daily_notification_counts.sent_count < $3 \
             RETURNING sent_count",
        )
        .bind(user_id)
        .bind(day)
        .bind(max_per_day)
        .fetch_optional(&mut *tx)
        .await?;

        if counted.is_none() {
            tx.rollback().await?;
            return Ok(ReserveOutcome::RateCapped);
        }

        tx.commit().await?;
        Ok(ReserveOutcome::Reserved)
    }
}
