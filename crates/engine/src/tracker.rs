//! Trigger bookkeeping: dedup and daily rate caps.

use std::sync::Arc;

use flipscout_core::clock;
use flipscout_core::types::{DbId, Timestamp};
use flipscout_core::NotificationPreferences;

use crate::store::{AlertStore, StoreError, TriggerReservation};

/// Decides whether a (rule, deal) match may notify at all.
///
/// The heavy lifting is the store's atomic reservation; the tracker's job
/// is to resolve the user-local calendar day the cap counts against.
pub struct TriggerTracker {
    store: Arc<dyn AlertStore>,
}

impl TriggerTracker {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self { store }
    }

    /// Reserve a trigger slot for the match, or report the suppression.
    ///
    /// The daily cap counts against the user's local day, so a user at
    /// UTC+10 gets a fresh allowance at their midnight, not at UTC's.
    pub async fn reserve(
        &self,
        rule_id: DbId,
        deal_id: &str,
        prefs: &NotificationPreferences,
        now: Timestamp,
    ) -> Result<TriggerReservation, StoreError> {
        let day = clock::local_day(now, prefs.utc_offset_minutes);
        self.store
            .reserve_trigger(rule_id, deal_id, prefs.user_id, day, prefs.max_per_day)
            .await
    }
}
