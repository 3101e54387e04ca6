//! Route definitions for the `/users/{user_id}/preferences` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::preference;
use crate::state::AppState;

/// Routes mounted at `/users/{user_id}/preferences`.
///
/// ```text
/// GET /  -> get (stored preferences, or defaults)
/// PUT /  -> update (field-scoped)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(preference::get).put(preference::update))
}
