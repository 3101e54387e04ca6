//! Notification preference entity model and DTOs.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use flipscout_core::channels::parse_channels;
use flipscout_core::error::CoreError;
use flipscout_core::prefs::{weekday_from_index, Frequency, NotificationPreferences};
use flipscout_core::types::{DbId, Timestamp};

/// A row from the `notification_preferences` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PreferencesRow {
    pub user_id: DbId,
    pub channels: Vec<String>,
    pub frequency: String,
    pub digest_time: Option<NaiveTime>,
    /// 0 = Monday .. 6 = Sunday.
    pub digest_weekday: i16,
    pub quiet_hours_enabled: bool,
    pub quiet_start: Option<NaiveTime>,
    pub quiet_end: Option<NaiveTime>,
    pub max_per_day: i32,
    pub utc_offset_minutes: i32,
    pub email: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified: bool,
    pub push_token: Option<String>,
    pub updated_at: Timestamp,
}

impl PreferencesRow {
    /// Convert into the domain policy the scheduler consumes. Fails only
    /// on corrupt `frequency`, `channels`, or `digest_weekday` columns.
    pub fn to_core(&self) -> Result<NotificationPreferences, CoreError> {
        Ok(NotificationPreferences {
            user_id: self.user_id,
            channels: parse_channels(&self.channels)?,
            frequency: self.frequency.parse::<Frequency>()?,
            digest_time: self.digest_time,
            digest_weekday: weekday_from_index(self.digest_weekday)?,
            quiet_hours_enabled: self.quiet_hours_enabled,
            quiet_start: self.quiet_start,
            quiet_end: self.quiet_end,
            max_per_day: self.max_per_day,
            utc_offset_minutes: self.utc_offset_minutes,
            email: self.email.clone(),
            discord_webhook_url: self.discord_webhook_url.clone(),
            phone_number: self.phone_number.clone(),
            phone_verified: self.phone_verified,
            push_token: self.push_token.clone(),
        })
    }
}

/// DTO for field-scoped preference updates. Absent fields keep their
/// stored value: the handler overlays the payload onto the current row
/// (or the defaults) and upserts the merged result.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePreferences {
    pub channels: Option<Vec<String>>,
    pub frequency: Option<String>,
    pub digest_time: Option<NaiveTime>,
    /// Lowercase English weekday name (monday..sunday).
    pub digest_weekday: Option<String>,
    pub quiet_hours_enabled: Option<bool>,
    pub quiet_start: Option<NaiveTime>,
    pub quiet_end: Option<NaiveTime>,
    pub max_per_day: Option<i32>,
    pub utc_offset_minutes: Option<i32>,
    pub email: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified: Option<bool>,
    pub push_token: Option<String>,
}
