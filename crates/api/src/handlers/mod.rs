//! Request handlers for the deal-alert API.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers validate payloads first, then delegate to the repositories in
//! `flipscout_db` and map errors via [`AppError`].

pub mod attempt;
pub mod channel;
pub mod deal;
pub mod preference;
pub mod rule;

use flipscout_core::error::CoreError;
use flipscout_core::types::DbId;
use flipscout_db::repositories::UserRepo;

use crate::error::AppError;
use crate::state::AppState;

/// 404 unless the user row exists.
///
/// There is no auth layer, so write handlers check the path's user id
/// before inserting; otherwise a missing user surfaces as a foreign-key
/// 500 instead of a 404.
pub(crate) async fn ensure_user_exists(state: &AppState, user_id: DbId) -> Result<(), AppError> {
    if UserRepo::get(&state.pool, user_id).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }));
    }
    Ok(())
}
