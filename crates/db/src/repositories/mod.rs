//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod attempt_repo;
pub mod deal_repo;
pub mod preference_repo;
pub mod rule_repo;
pub mod trigger_repo;
pub mod user_repo;

pub use attempt_repo::AttemptRepo;
pub use deal_repo::DealRepo;
pub use preference_repo::{PreferenceRepo, PreferenceValues};
pub use rule_repo::RuleRepo;
pub use trigger_repo::{ReserveOutcome, TriggerRepo};
pub use user_repo::UserRepo;
