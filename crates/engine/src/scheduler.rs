//! Delivery scheduling: immediate dispatch, quiet-hours deferral, and
//! digest batching.
//!
//! The scheduler is in-process state keyed by user. Reserved matches flow
//! in through [`DeliveryScheduler::accept`]; the engine's periodic tick
//! drains whatever has become deliverable through
//! [`DeliveryScheduler::collect_due`]. Digest buckets swap out atomically
//! at flush time, and a flush whose dispatch fails on every channel can be
//! put back with [`DeliveryScheduler::restore_digest`] so the matches are
//! not lost.

use std::collections::HashMap;
use std::mem;

use flipscout_core::clock;
use flipscout_core::types::{DbId, Timestamp};
use flipscout_core::{
    ChannelKind, DealSummary, Frequency, NotificationPayload, NotificationPreferences,
};
use tokio::sync::Mutex;

/// A reserved (rule, deal) match on its way to delivery.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub user_id: DbId,
    pub rule_id: DbId,
    /// Channels requested by the rule, snapshotted at match time.
    pub channels: Vec<ChannelKind>,
    pub deal: DealSummary,
    pub matched_at: Timestamp,
}

/// What [`DeliveryScheduler::accept`] decided for one match.
#[derive(Debug)]
pub enum ScheduleDecision {
    /// Dispatch right away; the event is handed back to the caller.
    DispatchNow(MatchEvent),
    /// Quiet hours are active; the event is held until the given instant.
    Held(Timestamp),
    /// Banked into the user's digest bucket.
    Digested,
}

/// A notification that became deliverable on this tick.
#[derive(Debug)]
pub struct DueDelivery {
    pub user_id: DbId,
    /// Set for single-deal deliveries; digests span rules and carry none.
    pub rule_id: Option<DbId>,
    pub channels: Vec<ChannelKind>,
    pub payload: NotificationPayload,
    /// For digests, the events behind the payload. Handed back through
    /// [`DeliveryScheduler::restore_digest`] if dispatch fails entirely.
    pub digest_events: Option<Vec<MatchEvent>>,
}

#[derive(Debug, Default)]
struct UserState {
    /// Digest bucket, in arrival order.
    bucket: Vec<MatchEvent>,
    /// Quiet-hours holds: (release instant, event).
    deferred: Vec<(Timestamp, MatchEvent)>,
    /// The digest boundary most recently accounted for.
    last_boundary: Option<Timestamp>,
    /// A boundary was crossed (or a flush failed) and the bucket still
    /// needs flushing. Stays set while quiet hours block the flush.
    flush_owed: bool,
}

/// Per-user delivery state machine.
#[derive(Debug, Default)]
pub struct DeliveryScheduler {
    users: Mutex<HashMap<DbId, UserState>>,
}

impl DeliveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one reserved match: immediate, held, or digested.
    pub async fn accept(
        &self,
        event: MatchEvent,
        prefs: &NotificationPreferences,
        now: Timestamp,
    ) -> ScheduleDecision {
        match prefs.frequency {
            Frequency::Immediate => {
                if let Some((start, end)) = prefs.quiet_window() {
                    let local = clock::to_local(now, prefs.utc_offset_minutes).time();
                    if clock::in_quiet_window(local, start, end) {
                        let release =
                            clock::quiet_release_at(now, prefs.utc_offset_minutes, start, end);
                        let mut users = self.users.lock().await;
                        users
                            .entry(event.user_id)
                            .or_default()
                            .deferred
                            .push((release, event));
                        return ScheduleDecision::Held(release);
                    }
                }
                ScheduleDecision::DispatchNow(event)
            }
            Frequency::Daily | Frequency::Weekly => {
                let mut users = self.users.lock().await;
                let state = users.entry(event.user_id).or_default();
                if state.last_boundary.is_none() {
                    // First contact: matches from before the coming boundary
                    // belong to it, not to one already in the past.
                    state.last_boundary = digest_boundary(prefs, now);
                }
                state.bucket.push(event);
                ScheduleDecision::Digested
            }
        }
    }

    /// Users that currently hold any deferred or digested state.
    pub async fn pending_users(&self) -> Vec<DbId> {
        self.users.lock().await.keys().copied().collect()
    }

    /// Drain everything that became deliverable by `now`.
    ///
    /// Digest buckets are swapped out here, not at the boundary instant,
    /// so matches arriving between the boundary and the tick still ride
    /// in the same digest.
    pub async fn collect_due(
        &self,
        now: Timestamp,
        prefs_by_user: &HashMap<DbId, NotificationPreferences>,
    ) -> Vec<DueDelivery> {
        let mut due = Vec::new();
        let mut users = self.users.lock().await;

        for (&user_id, state) in users.iter_mut() {
            let fallback;
            let prefs = match prefs_by_user.get(&user_id) {
                Some(p) => p,
                None => {
                    fallback = NotificationPreferences::default_for(user_id);
                    &fallback
                }
            };

            // Quiet-hours holds whose release has passed go out one by one.
            let mut still_held = Vec::new();
            for (release, event) in state.deferred.drain(..) {
                if release <= now {
                    due.push(DueDelivery {
                        user_id,
                        rule_id: Some(event.rule_id),
                        channels: event.channels.clone(),
                        payload: NotificationPayload::single(event.deal),
                        digest_events: None,
                    });
                } else {
                    still_held.push((release, event));
                }
            }
            state.deferred = still_held;

            if prefs.frequency.is_digest() {
                if let Some(boundary) = digest_boundary(prefs, now) {
                    if state.last_boundary != Some(boundary) {
                        state.last_boundary = Some(boundary);
                        state.flush_owed = true;
                    }
                }
                if state.flush_owed && !in_quiet_now(prefs, now) {
                    state.flush_owed = false;
                    if !state.bucket.is_empty() {
                        let events = mem::take(&mut state.bucket);
                        due.push(digest_delivery(user_id, events));
                    }
                }
            }
        }

        users.retain(|_, s| !s.bucket.is_empty() || !s.deferred.is_empty() || s.flush_owed);
        due
    }

    /// Put a digest whose dispatch failed on every channel back into the
    /// bucket, ahead of anything that arrived in the meantime, and flag
    /// the user for a retry on the next tick.
    pub async fn restore_digest(&self, user_id: DbId, events: Vec<MatchEvent>) {
        let mut users = self.users.lock().await;
        let state = users.entry(user_id).or_default();
        let mut restored = events;
        restored.append(&mut state.bucket);
        state.bucket = restored;
        state.flush_owed = true;
    }
}

#[cfg(test)]
impl DeliveryScheduler {
    async fn bucket_size(&self, user_id: DbId) -> usize {
        self.users
            .lock()
            .await
            .get(&user_id)
            .map(|s| s.bucket.len())
            .unwrap_or(0)
    }

    async fn deferred_size(&self, user_id: DbId) -> usize {
        self.users
            .lock()
            .await
            .get(&user_id)
            .map(|s| s.deferred.len())
            .unwrap_or(0)
    }
}

/// The most recent digest boundary for these preferences, if they define
/// one.
fn digest_boundary(prefs: &NotificationPreferences, now: Timestamp) -> Option<Timestamp> {
    let at = prefs.digest_time?;
    match prefs.frequency {
        Frequency::Immediate => None,
        Frequency::Daily => Some(clock::latest_daily_boundary(
            now,
            prefs.utc_offset_minutes,
            at,
        )),
        Frequency::Weekly => Some(clock::latest_weekly_boundary(
            now,
            prefs.utc_offset_minutes,
            at,
            prefs.digest_weekday,
        )),
    }
}

fn in_quiet_now(prefs: &NotificationPreferences, now: Timestamp) -> bool {
    match prefs.quiet_window() {
        Some((start, end)) => {
            let local = clock::to_local(now, prefs.utc_offset_minutes).time();
            clock::in_quiet_window(local, start, end)
        }
        None => false,
    }
}

fn digest_delivery(user_id: DbId, events: Vec<MatchEvent>) -> DueDelivery {
    let mut channels: Vec<ChannelKind> = Vec::new();
    for event in &events {
        for &ch in &event.channels {
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }
    let deals: Vec<DealSummary> = events.iter().map(|e| e.deal.clone()).collect();
    DueDelivery {
        user_id,
        rule_id: None,
        channels,
        payload: NotificationPayload::digest(deals),
        digest_events: Some(events),
    }
}
