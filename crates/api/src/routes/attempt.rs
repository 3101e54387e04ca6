//! Route definitions for the `/users/{user_id}/attempts` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::attempt;
use crate::state::AppState;

/// Routes mounted at `/users/{user_id}/attempts`.
///
/// ```text
/// GET / -> list_recent
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(attempt::list_recent))
}
