//! Route definitions for the `/deals` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::deal;
use crate::state::AppState;

/// Routes mounted at `/deals`.
///
/// ```text
/// POST /batch -> ingest_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/batch", post(deal::ingest_batch))
}
