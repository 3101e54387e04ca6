//! Handlers for the `/users/{user_id}/preferences` resource.

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveTime;
use serde::Serialize;

use flipscout_core::channels::parse_channels;
use flipscout_core::prefs::{
    weekday_from_name, weekday_name, weekday_to_index, Frequency, NotificationPreferences,
};
use flipscout_core::types::DbId;
use flipscout_db::models::preference::UpdatePreferences;
use flipscout_db::repositories::{PreferenceRepo, PreferenceValues};

use crate::error::{AppError, AppResult};
use crate::handlers::ensure_user_exists;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

/// Wire rendering of a user's effective preferences.
///
/// Serves both stored rows and the defaults handed to users who never
/// saved preferences, which is why this is not the database row itself.
#[derive(Debug, Serialize)]
pub struct PreferencesView {
    pub user_id: DbId,
    pub channels: Vec<&'static str>,
    pub frequency: &'static str,
    pub digest_time: Option<NaiveTime>,
    pub digest_weekday: &'static str,
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
}

impl From<NotificationPreferences> for PreferencesView {
    fn from(p: NotificationPreferences) -> Self {
        Self {
            user_id: p.user_id,
            channels: p.channels.iter().map(|c| c.as_str()).collect(),
            frequency: p.frequency.as_str(),
            digest_time: p.digest_time,
            digest_weekday: weekday_name(p.digest_weekday),
            quiet_hours_enabled: p.quiet_hours_enabled,
            quiet_start: p.quiet_start,
            quiet_end: p.quiet_end,
            max_per_day: p.max_per_day,
            utc_offset_minutes: p.utc_offset_minutes,
            email: p.email,
            discord_webhook_url: p.discord_webhook_url,
            phone_number: p.phone_number,
            phone_verified: p.phone_verified,
            push_token: p.push_token,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/users/{user_id}/preferences
///
/// Users who never saved preferences get the defaults: immediate email
/// delivery, no quiet hours, ten notifications per day, UTC.
pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PreferencesView>>> {
    let prefs = load_effective(&state, user_id).await?;
    Ok(Json(DataResponse { data: prefs.into() }))
}

/// PUT /api/v1/users/{user_id}/preferences
///
/// Field-scoped update: absent fields keep their current (or default)
/// values. The merged record is validated as a whole before the upsert,
/// so a stored record can never be left inconsistent.
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Json(input): Json<UpdatePreferences>,
) -> AppResult<Json<DataResponse<PreferencesView>>> {
    ensure_user_exists(&state, user_id).await?;

    let mut merged = load_effective(&state, user_id).await?;
    apply_update(&mut merged, input)?;
    merged.validate()?;

    let row = PreferenceRepo::upsert(&state.pool, user_id, &to_values(&merged)).await?;
    let stored = row.to_core().map_err(|e| {
        AppError::InternalError(format!(
            "Upserted preferences for user {user_id} are unreadable: {e}"
        ))
    })?;
    tracing::info!(user_id, "Notification preferences updated");
    Ok(Json(DataResponse {
        data: stored.into(),
    }))
}

/// The user's stored preferences, or defaults when no row exists.
pub(crate) async fn load_effective(
    state: &AppState,
    user_id: DbId,
) -> Result<NotificationPreferences, AppError> {
    match PreferenceRepo::get(&state.pool, user_id).await? {
        Some(row) => row.to_core().map_err(|e| {
            AppError::InternalError(format!(
                "Stored preferences for user {user_id} are unreadable: {e}"
            ))
        }),
        None => Ok(NotificationPreferences::default_for(user_id)),
    }
}

// ---------------------------------------------------------------------------
// Merge helpers
// ---------------------------------------------------------------------------

/// Overlay a payload onto the current preferences. Parse failures
/// (unknown channel, frequency, or weekday) reject the whole update.
fn apply_update(
    prefs: &mut NotificationPreferences,
    input: UpdatePreferences,
) -> Result<(), AppError> {
    if let Some(list) = &input.channels {
        prefs.channels = parse_channels(list)?;
    }
    if let Some(raw) = &input.frequency {
        prefs.frequency = raw.parse::<Frequency>()?;
    }
    if let Some(t) = input.digest_time {
        prefs.digest_time = Some(t);
    }
    if let Some(name) = &input.digest_weekday {
        prefs.digest_weekday = weekday_from_name(name)?;
    }
    if let Some(v) = input.quiet_hours_enabled {
        prefs.quiet_hours_enabled = v;
    }
    if let Some(t) = input.quiet_start {
        prefs.quiet_start = Some(t);
    }
    if let Some(t) = input.quiet_end {
        prefs.quiet_end = Some(t);
    }
    if let Some(v) = input.max_per_day {
        prefs.max_per_day = v;
    }
    if let Some(v) = input.utc_offset_minutes {
        prefs.utc_offset_minutes = v;
    }
    if let Some(v) = input.email {
        prefs.email = Some(v);
    }
    if let Some(v) = input.discord_webhook_url {
        prefs.discord_webhook_url = Some(v);
    }
    if let Some(v) = input.phone_number {
        // Changing the number invalidates any previous verification;
        // the same payload may still set the flag explicitly.
        prefs.phone_number = Some(v);
        prefs.phone_verified = false;
    }
    if let Some(v) = input.phone_verified {
        prefs.phone_verified = v;
    }
    if let Some(v) = input.push_token {
        prefs.push_token = Some(v);
    }
    Ok(())
}

/// Flatten domain preferences into the repository's binding shape.
fn to_values(p: &NotificationPreferences) -> PreferenceValues {
    PreferenceValues {
        channels: p.channels.iter().map(|c| c.as_str().to_string()).collect(),
        frequency: p.frequency.as_str().to_string(),
        digest_time: p.digest_time,
        digest_weekday: weekday_to_index(p.digest_weekday),
        quiet_hours_enabled: p.quiet_hours_enabled,
        quiet_start: p.quiet_start,
        quiet_end: p.quiet_end,
        max_per_day: p.max_per_day,
        utc_offset_minutes: p.utc_offset_minutes,
        email: p.email.clone(),
        discord_webhook_url: p.discord_webhook_url.clone(),
        phone_number: p.phone_number.clone(),
        phone_verified: p.phone_verified,
        push_token: p.push_token.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
