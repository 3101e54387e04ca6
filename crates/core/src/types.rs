/// Primary key type for database-backed entities (PostgreSQL BIGSERIAL).
pub type DbId = i64;

/// All timestamps are UTC; user-local conversions happen in [`crate::clock`].
pub type Timestamp = chrono::DateTime<chrono::Utc>;
