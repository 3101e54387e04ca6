//! Row models and DTOs.
//!
//! Each submodule carries a `FromRow` + `Serialize` row struct matching
//! its table, with a `to_core` conversion into the domain type where the
//! engine needs one, plus the `Deserialize` create/update DTOs for the
//! entities the API writes (all-`Option` fields on updates).

pub mod attempt;
pub mod deal;
pub mod preference;
pub mod rule;
pub mod user;
