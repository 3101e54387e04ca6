//! Postgres-backed [`AlertStore`] over the database repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use flipscout_core::types::{DbId, Timestamp};
use flipscout_core::NotificationPreferences;
use flipscout_db::repositories::{
    AttemptRepo, PreferenceRepo, ReserveOutcome, RuleRepo, TriggerRepo,
};
use flipscout_db::DbPool;

use super::{AlertStore, MatchTargets, NewAttempt, StoreError, TriggerReservation};

pub struct PgAlertStore {
    pool: DbPool,
}

impl PgAlertStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn load_targets(&self) -> Result<MatchTargets, StoreError> {
        let rows = RuleRepo::list_enabled_for_active_users(&self.pool).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let rule_id = row.id;
            match row.to_core() {
                Ok(rule) => rules.push(rule),
                // One bad row must not take down the whole matching pass.
                Err(e) => tracing::error!(rule_id, error = %e, "Skipping unreadable alert rule"),
            }
        }

        let mut user_ids: Vec<DbId> = rules.iter().map(|r| r.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let prefs = self.load_preferences(&user_ids).await?;

        Ok(MatchTargets { rules, prefs })
    }

    async fn load_preferences(
        &self,
        user_ids: &[DbId],
    ) -> Result<HashMap<DbId, NotificationPreferences>, StoreError> {
        let rows = PreferenceRepo::get_many(&self.pool, user_ids).await?;

        let mut out = HashMap::with_capacity(user_ids.len());
        for row in rows {
            let user_id = row.user_id;
            match row.to_core() {
                Ok(prefs) => {
                    out.insert(user_id, prefs);
                }
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Skipping unreadable preferences row")
                }
            }
        }
        for &user_id in user_ids {
            out.entry(user_id)
                .or_insert_with(|| NotificationPreferences::default_for(user_id));
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
        let outcome =
            TriggerRepo::reserve(&self.pool, rule_id, deal_id, user_id, day, max_per_day).await?;
        Ok(match outcome {
            ReserveOutcome::Reserved => TriggerReservation::Proceed,
            ReserveOutcome::DuplicateTrigger => TriggerReservation::Duplicate,
            ReserveOutcome::RateCapped => TriggerReservation::RateCapped,
        })
    }

    async fn touch_last_triggered(&self, rule_id: DbId, at: Timestamp) -> Result<(), StoreError> {
        RuleRepo::touch_last_triggered(&self.pool, rule_id, at).await?;
        Ok(())
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<DbId, StoreError> {
        let row = flipscout_db::models::attempt::NewAttempt {
            user_id: attempt.user_id,
            rule_id: attempt.rule_id,
            channel: attempt.channel.as_str().to_string(),
            payload: serde_json::to_value(&attempt.payload)?,
        };
        let id = AttemptRepo::create(&self.pool, &row).await?;
        Ok(id)
    }

    async fn mark_attempt_sent(&self, attempt_id: DbId, retries: i16) -> Result<(), StoreError> {
        AttemptRepo::mark_sent(&self.pool, attempt_id, retries).await?;
        Ok(())
    }

    async fn mark_attempt_failed(
        &self,
        attempt_id: DbId,
        retries: i16,
        error: &str,
    ) -> Result<(), StoreError> {
        AttemptRepo::mark_failed(&self.pool, attempt_id, retries, error).await?;
        Ok(())
    }
}
