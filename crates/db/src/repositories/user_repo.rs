//! Repository for the `users` table.

use sqlx::PgPool;

use flipscout_core::types::DbId;

use crate::models::user::UserRow;

/// Column list for `users` queries.
const COLUMNS: &str = "id, display_name, is_active, created_at";

/// Provides lookups for users. Accounts are provisioned out of band;
/// this service only ever checks that an owner row exists. Inactive
/// accounts keep their rules and preferences editable; the engine's
/// matching query is what takes them out of delivery.
pub struct UserRepo;

impl UserRepo {
    /// Fetch a user by id.
    pub async fn get(pool: &PgPool, user_id: DbId) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
