//! Route definitions for the `/users/{user_id}/rules` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::rule;
use crate::state::AppState;

/// Routes mounted at `/users/{user_id}/rules`.
///
/// ```text
/// GET    /                   -> list
/// POST   /                   -> create
/// GET    /{rule_id}          -> get_by_id
/// PUT    /{rule_id}          -> update
/// DELETE /{rule_id}          -> delete
/// POST   /{rule_id}/pause    -> pause
/// POST   /{rule_id}/resume   -> resume
/// POST   /{rule_id}/test     -> test (dry-run, no state mutation)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rule::list).post(rule::create))
        .route(
            "/{rule_id}",
            get(rule::get_by_id).put(rule::update).delete(rule::delete),
        )
        .route("/{rule_id}/pause", post(rule::pause))
        .route("/{rule_id}/resume", post(rule::resume))
        .route("/{rule_id}/test", post(rule::test))
}
