//! Handlers for the `/users/{user_id}/attempts` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use flipscout_core::types::DbId;
use flipscout_db::models::attempt::AttemptRow;
use flipscout_db::repositories::AttemptRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /users/{user_id}/attempts`.
#[derive(Debug, Deserialize)]
pub struct AttemptQuery {
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
}

/// Default page size for attempt listing.
const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for attempt listing.
const MAX_LIMIT: i64 = 200;

/// GET /api/v1/users/{user_id}/attempts
///
/// The user's most recent notification attempts, newest first: one row
/// per (channel, dispatch) with status, retry count, and final error.
pub async fn list_recent(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(params): Query<AttemptQuery>,
) -> AppResult<Json<DataResponse<Vec<AttemptRow>>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let attempts = AttemptRepo::list_recent_for_user(&state.pool, user_id, limit).await?;
    Ok(Json(DataResponse { data: attempts }))
}
