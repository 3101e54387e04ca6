//! Repository for the `notification_preferences` table.

use sqlx::PgPool;

use flipscout_core::types::DbId;

use crate::models::preference::PreferencesRow;

/// Column list for `notification_preferences` queries.
const COLUMNS: &str = "\
    user_id, channels, frequency, digest_time, digest_weekday, \
    quiet_hours_enabled, quiet_start, quiet_end, max_per_day, \
    utc_offset_minutes, email, discord_webhook_url, phone_number, \
    phone_verified, push_token, updated_at";

/// Binding shape for [`PreferenceRepo::upsert`]: the merged row the
/// handler built by applying an update DTO over the current values.
#[derive(Debug, Clone)]
pub struct PreferenceValues {
    pub channels: Vec<String>,
    pub frequency: String,
    pub digest_time: Option<chrono::NaiveTime>,
    pub digest_weekday: i16,
    pub quiet_hours_enabled: bool,
    pub quiet_start: Option<chrono::NaiveTime>,
    pub quiet_end: Option<chrono::NaiveTime>,
    pub max_per_day: i32,
    pub utc_offset_minutes: i32,
    pub email: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified: bool,
    pub push_token: Option<String>,
}

/// Provides operations for per-user notification preferences.
pub struct PreferenceRepo;

impl PreferenceRepo {
    /// Fetch a user's stored preferences, if any. Callers apply defaults
    /// for users without a row.
    pub async fn get(pool: &PgPool, user_id: DbId) -> Result<Option<PreferencesRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_preferences WHERE user_id = $1");
        sqlx::query_as::<_, PreferencesRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch stored preferences for several users in one round-trip.
    pub async fn get_many(
        pool: &PgPool,
        user_ids: &[DbId],
    ) -> Result<Vec<PreferencesRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM notification_preferences WHERE user_id = ANY($1)");
        sqlx::query_as::<_, PreferencesRow>(&query)
            .bind(user_ids)
            .fetch_all(pool)
            .await
    }

    /// Write the full merged preference row in a single upsert.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        values: &PreferenceValues,
    ) -> Result<PreferencesRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_preferences \
                (user_id, channels, frequency, digest_time, digest_weekday, \
                 quiet_hours_enabled, quiet_start, quiet_end, max_per_day, \
                 utc_offset_minutes, email, discord_webhook_url, phone_number, \
                 phone_verified, push_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (user_id) DO UPDATE SET \
                channels = EXCLUDED.channels, \
                frequency = EXCLUDED.frequency, \
                digest_time = EXCLUDED.digest_time, \
                digest_weekday = EXCLUDED.digest_weekday, \
                quiet_hours_enabled = EXCLUDED.quiet_hours_enabled, \
                quiet_start = EXCLUDED.quiet_start, \
                quiet_end = EXCLUDED.quiet_end, \
                max_per_day = EXCLUDED.max_per_day, \
                utc_offset_minutes = EXCLUDED.utc_offset_minutes, \
                email = EXCLUDED.email, \
                discord_webhook_url = EXCLUDED.discord_webhook_url, \
                phone_number = EXCLUDED.phone_number, \
                phone_verified = EXCLUDED.phone_verified, \
                push_token = EXCLUDED.push_token, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PreferencesRow>(&query)
            .bind(user_id)
            .bind(&values.channels)
            .bind(&values.frequency)
            .bind(values.digest_time)
            .bind(values.digest_weekday)
            .bind(values.quiet_hours_enabled)
            .bind(values.quiet_start)
            .bind(values.quiet_end)
            .bind(values.max_per_day)
            .bind(values.utc_offset_minutes)
            .bind(&values.email)
            .bind(&values.discord_webhook_url)
            .bind(&values.phone_number)
            .bind(values.phone_verified)
            .bind(&values.push_token)
            .fetch_one(pool)
            .await
    }
}
