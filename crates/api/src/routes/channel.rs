//! Route definitions for the `/users/{user_id}/channels` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::channel;
use crate::state::AppState;

/// Routes mounted at `/users/{user_id}/channels`.
///
/// ```text
/// POST /{kind}/test -> test (one-shot send, synchronous verdict)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{kind}/test", post(channel::test))
}
