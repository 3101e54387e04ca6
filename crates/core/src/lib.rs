//! Pure domain types and decision logic for the flipscout alert engine.
//!
//! Everything in this crate is deterministic and free of I/O so the
//! matching, delivery-window, and rendering rules can be unit tested
//! without a database or a running executor:
//!
//! - [`matcher`] — the rule-versus-deal predicate.
//! - [`clock`] — user-local time math (quiet hours, digest boundaries,
//!   day boundaries for the daily cap).
//! - [`payload`] — notification payload shapes and plain-text rendering
//!   shared by every delivery channel.

pub mod channels;
pub mod clock;
pub mod deal;
pub mod error;
pub mod matcher;
pub mod payload;
pub mod prefs;
pub mod rule;
pub mod types;

pub use channels::ChannelKind;
pub use deal::{Condition, Deal};
pub use error::CoreError;
pub use payload::{DealSummary, NotificationPayload};
pub use prefs::{Frequency, NotificationPreferences};
pub use rule::AlertRule;
