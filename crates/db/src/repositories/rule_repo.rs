//! Repository for the `alert_rules` table.

use sqlx::PgPool;

use flipscout_core::types::{DbId, Timestamp};

use crate::models::rule::{AlertRuleRow, CreateAlertRule, UpdateAlertRule};

/// Column list for `alert_rules` queries.
const COLUMNS: &str = "\
    id, user_id, name, keywords, exclude_keywords, categories, min_condition, \
    min_price, max_price, min_deal_score, location, radius_km, channels, \
    enabled, last_triggered_at, created_at, updated_at";

/// Qualified column list for joins against `alert_rules r`.
const COLUMNS_QUALIFIED: &str = "\
    r.id, r.user_id, r.name, r.keywords, r.exclude_keywords, r.categories, \
    r.min_condition, r.min_price, r.max_price, r.min_deal_score, r.location, \
    r.radius_km, r.channels, r.enabled, r.last_triggered_at, r.created_at, \
    r.updated_at";

/// Provides CRUD operations for alert rules.
pub struct RuleRepo;

impl RuleRepo {
    /// Create a rule for a user. The caller has already validated and
    /// normalized the DTO.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        rule: &CreateAlertRule,
    ) -> Result<AlertRuleRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO alert_rules \
                (user_id, name, keywords, exclude_keywords, categories, min_condition, \
                 min_price, max_price, min_deal_score, location, radius_km, channels, enabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AlertRuleRow>(&query)
            .bind(user_id)
            .bind(&rule.name)
            .bind(&rule.keywords)
            .bind(&rule.exclude_keywords)
            .bind(&rule.categories)
            .bind(&rule.min_condition)
            .bind(rule.min_price)
            .bind(rule.max_price)
            .bind(rule.min_deal_score)
            .bind(&rule.location)
            .bind(rule.radius_km)
            .bind(&rule.channels)
            .bind(rule.enabled.unwrap_or(true))
            .fetch_one(pool)
            .await
    }

    /// List a user's rules, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<AlertRuleRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alert_rules WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, AlertRuleRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Fetch one rule, scoped to its owner.
    pub async fn get(
        pool: &PgPool,
        user_id: DbId,
        rule_id: DbId,
    ) -> Result<Option<AlertRuleRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alert_rules WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, AlertRuleRow>(&query)
            .bind(rule_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Patch a rule. Absent DTO fields keep their stored values.
    ///
    /// Returns `None` when the rule does not exist or belongs to another
    /// user.
    pub async fn update(
        pool: &PgPool,
        user_id: DbId,
        rule_id: DbId,
        changes: &UpdateAlertRule,
    ) -> Result<Option<AlertRuleRow>, sqlx::Error> {
        let query = format!(
            "UPDATE alert_rules SET \
                name = COALESCE($3, name), \
                keywords = COALESCE($4, keywords), \
                exclude_keywords = COALESCE($5, exclude_keywords), \
                categories = COALESCE($6, categories), \
                min_condition = COALESCE($7, min_condition), \
                min_price = COALESCE($8, min_price), \
                max_price = COALESCE($9, max_price), \
                min_deal_score = COALESCE($10, min_deal_score), \
                location = COALESCE($11, location), \
                radius_km = COALESCE($12, radius_km), \
                channels = COALESCE($13, channels), \
                enabled = COALESCE($14, enabled), \
                updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AlertRuleRow>(&query)
            .bind(rule_id)
            .bind(user_id)
            .bind(&changes.name)
            .bind(&changes.keywords)
            .bind(&changes.exclude_keywords)
            .bind(&changes.categories)
            .bind(&changes.min_condition)
            .bind(changes.min_price)
            .bind(changes.max_price)
            .bind(changes.min_deal_score)
            .bind(&changes.location)
            .bind(changes.radius_km)
            .bind(&changes.channels)
            .bind(changes.enabled)
            .fetch_optional(pool)
            .await
    }

    /// Delete a rule and (via cascade) its trigger history.
    ///
    /// Returns `true` when a row was removed.
    pub async fn delete(pool: &PgPool, user_id: DbId, rule_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alert_rules WHERE id = $1 AND user_id = $2")
            .bind(rule_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pause or resume a rule.
    pub async fn set_enabled(
        pool: &PgPool,
        user_id: DbId,
        rule_id: DbId,
        enabled: bool,
    ) -> Result<Option<AlertRuleRow>, sqlx::Error> {
        let query = format!(
            "UPDATE alert_rules SET enabled = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AlertRuleRow>(&query)
            .bind(rule_id)
            .bind(user_id)
            .bind(enabled)
            .fetch_optional(pool)
            .await
    }

    /// All enabled rules whose owners are active: the matching pass input.
    pub async fn list_enabled_for_active_users(
        pool: &PgPool,
    ) -> Result<Vec<AlertRuleRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS_QUALIFIED} FROM alert_rules r \
             JOIN users u ON u.id = r.user_id \
             WHERE r.enabled AND u.is_active \
             ORDER BY r.user_id, r.id"
        );
        sqlx::query_as::<_, AlertRuleRow>(&query).fetch_all(pool).await
    }

    /// Stamp `last_triggered_at` after a successful reservation.
    pub async fn touch_last_triggered(
        pool: &PgPool,
        rule_id: DbId,
        at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE alert_rules SET last_triggered_at = $2 WHERE id = $1")
            .bind(rule_id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(())
    }
}
