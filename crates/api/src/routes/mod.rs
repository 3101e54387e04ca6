pub mod attempt;
pub mod channel;
pub mod deal;
pub mod health;
pub mod preference;
pub mod rule;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /deals/batch                              ingest a deal batch (POST)
///
/// /users/{user_id}/rules                    list, create
/// /users/{user_id}/rules/{rule_id}          get, update, delete
/// /users/{user_id}/rules/{rule_id}/pause    pause (POST)
/// /users/{user_id}/rules/{rule_id}/resume   resume (POST)
/// /users/{user_id}/rules/{rule_id}/test     dry-run against recent deals (POST)
///
/// /users/{user_id}/preferences              get, update
/// /users/{user_id}/channels/{kind}/test     one-shot channel test (POST)
///
/// /users/{user_id}/attempts                 recent notification attempts (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Deal ingest (feeds the alert engine via the broadcast bus).
        .nest("/deals", deal::router())
        // Per-user alert rule management.
        .nest("/users/{user_id}/rules", rule::router())
        // Per-user delivery preferences.
        .nest("/users/{user_id}/preferences", preference::router())
        // Synchronous channel tests.
        .nest("/users/{user_id}/channels", channel::router())
        // Delivery audit trail.
        .nest("/users/{user_id}/attempts", attempt::router())
}
