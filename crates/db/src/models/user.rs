//! User entity model.

use serde::Serialize;
use sqlx::FromRow;

use flipscout_core::types::{DbId, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRow {
    pub id: DbId,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}
