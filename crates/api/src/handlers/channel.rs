//! Handlers for the `/users/{user_id}/channels` resource.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use flipscout_core::channels::ChannelKind;
use flipscout_core::deal::Condition;
use flipscout_core::payload::{DealSummary, NotificationPayload};
use flipscout_core::types::DbId;

use crate::error::AppResult;
use crate::handlers::{ensure_user_exists, preference};
use crate::response::DataResponse;
use crate::state::AppState;

/// Synchronous verdict of a one-shot channel test.
#[derive(Debug, Serialize)]
pub struct ChannelTestReport {
    pub channel: &'static str,
    /// The attempt row the test wrote, `None` when even that insert failed.
    pub attempt_id: Option<DbId>,
    pub sent: bool,
    /// The adapter's final error when the send failed.
    pub error: Option<String>,
}

/// POST /api/v1/users/{user_id}/channels/{kind}/test
///
/// Send one fixed sample notification through the named channel and
/// return the adapter's verdict synchronously. Exactly one attempt row
/// is written; triggers and daily caps are not touched, and the channel
/// does not need to be in the user's master channel set yet.
pub async fn test(
    State(state): State<AppState>,
    Path((user_id, kind)): Path<(DbId, String)>,
) -> AppResult<Json<DataResponse<ChannelTestReport>>> {
    let channel = kind.parse::<ChannelKind>()?;
    ensure_user_exists(&state, user_id).await?;

    let prefs = preference::load_effective(&state, user_id).await?;
    let payload = NotificationPayload::single(sample_summary());

    let outcome = state.dispatcher.test_channel(&prefs, channel, &payload).await;
    tracing::info!(
        user_id,
        channel = %channel,
        sent = outcome.sent,
        "Channel test completed"
    );

    Ok(Json(DataResponse {
        data: ChannelTestReport {
            channel: outcome.channel.as_str(),
            attempt_id: outcome.attempt_id,
            sent: outcome.sent,
            error: outcome.error,
        },
    }))
}

/// The fixed deal every channel test sends.
fn sample_summary() -> DealSummary {
    DealSummary {
        deal_id: "channel-test".into(),
        title: "Test notification from Flipscout".into(),
        price: 49.99,
        condition: Condition::Good,
        category: "test".into(),
        deal_score: 0.87,
        rule_name: "Channel test".into(),
    }
}
