//! The alert engine run loop.
//!
//! One task owns the whole pipeline: it consumes deal batches from the
//! bus, matches them against every enabled rule, and walks each match
//! through trigger reservation, scheduling, and dispatch. A periodic tick
//! releases quiet-hours holds and flushes due digests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flipscout_core::matcher;
use flipscout_core::types::{DbId, Timestamp};
use flipscout_core::{DealSummary, NotificationPayload, NotificationPreferences};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::DealBatch;
use crate::dispatcher::ChannelDispatcher;
use crate::scheduler::{DeliveryScheduler, MatchEvent, ScheduleDecision};
use crate::store::{AlertStore, StoreError, TriggerReservation};
use crate::tracker::TriggerTracker;

/// How often the scheduler is polled for due digests and quiet-hours
/// releases.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Batch fan-out: users processed concurrently. Within one user the
/// pipeline stays strictly sequential.
const USER_CONCURRENCY: usize = 8;

/// Matches deals to rules and drives every surviving match to delivery.
pub struct AlertEngine {
    store: Arc<dyn AlertStore>,
    tracker: TriggerTracker,
    scheduler: DeliveryScheduler,
    dispatcher: Arc<ChannelDispatcher>,
    tick_interval: Duration,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn AlertStore>, dispatcher: Arc<ChannelDispatcher>) -> Self {
        Self {
            tracker: TriggerTracker::new(store.clone()),
            scheduler: DeliveryScheduler::new(),
            store,
            dispatcher,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Run until cancelled: consume deal batches and tick the scheduler.
    pub async fn run(self, mut batches: broadcast::Receiver<DealBatch>, cancel: CancellationToken) {
        tracing::info!(
            tick_secs = self.tick_interval.as_secs(),
            "Alert engine started"
        );
        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Alert engine stopped");
                    break;
                }
                result = batches.recv() => match result {
                    Ok(batch) => {
                        if let Err(e) = self.process_batch(&batch, Utc::now()).await {
                            tracing::error!(
                                batch_id = %batch.batch_id,
                                error = %e,
                                "Failed to process deal batch"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Deal feed lagged, batches were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Deal bus closed, alert engine shutting down");
                        break;
                    }
                },
                _ = interval.tick() => {
                    if let Err(e) = self.flush_due(Utc::now()).await {
                        tracing::error!(error = %e, "Scheduler flush failed");
                    }
                }
            }
        }
    }

    /// Evaluate one batch: a pure matching pass over every (rule, deal)
    /// pair, then per-user delivery. Users run concurrently; within one
    /// user matches are handled one at a time so the daily cap and dedup
    /// stay race-free.
    pub async fn process_batch(&self, batch: &DealBatch, now: Timestamp) -> Result<(), StoreError> {
        if batch.deals.is_empty() {
            return Ok(());
        }
        let targets = self.store.load_targets().await?;
        if targets.rules.is_empty() {
            return Ok(());
        }

        let mut per_user: HashMap<DbId, Vec<MatchEvent>> = HashMap::new();
        for rule in &targets.rules {
            for deal in &batch.deals {
                if matcher::rule_matches(rule, deal) {
                    per_user.entry(rule.user_id).or_default().push(MatchEvent {
                        user_id: rule.user_id,
                        rule_id: rule.id,
                        channels: rule.channels.clone(),
                        deal: DealSummary::from_deal(deal, &rule.name),
                        matched_at: now,
                    });
                }
            }
        }
        if per_user.is_empty() {
            tracing::debug!(batch_id = %batch.batch_id, "No rules matched the batch");
            return Ok(());
        }

        let matches: usize = per_user.values().map(Vec::len).sum();
        tracing::info!(
            batch_id = %batch.batch_id,
            deals = batch.deals.len(),
            matches,
            users = per_user.len(),
            "Deal batch matched"
        );

        let jobs: Vec<(NotificationPreferences, Vec<MatchEvent>)> = per_user
            .into_iter()
            .map(|(user_id, events)| {
                let prefs = targets
                    .prefs
                    .get(&user_id)
                    .cloned()
                    .unwrap_or_else(|| NotificationPreferences::default_for(user_id));
                (prefs, events)
            })
            .collect();

        futures::stream::iter(jobs)
            .for_each_concurrent(USER_CONCURRENCY, |(prefs, events)| {
                self.process_user_matches(prefs, events, now)
            })
            .await;

        Ok(())
    }

    /// Walk one user's matches in order. A store error skips only the
    /// match it hit.
    async fn process_user_matches(
        &self,
        prefs: NotificationPreferences,
        events: Vec<MatchEvent>,
        now: Timestamp,
    ) {
        for event in events {
            let reservation = match self
                .tracker
                .reserve(event.rule_id, &event.deal.deal_id, &prefs, now)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(
                        rule_id = event.rule_id,
                        deal_id = %event.deal.deal_id,
                        error = %e,
                        "Trigger reservation failed, skipping match"
                    );
                    continue;
                }
            };

            match reservation {
                TriggerReservation::Duplicate => {
                    tracing::debug!(
                        rule_id = event.rule_id,
                        deal_id = %event.deal.deal_id,
                        "Duplicate trigger suppressed"
                    );
                }
                TriggerReservation::RateCapped => {
                    tracing::debug!(
                        user_id = prefs.user_id,
                        rule_id = event.rule_id,
                        "Daily cap reached, match suppressed"
                    );
                }
                TriggerReservation::Proceed => {
                    // The rule fired; that holds even if delivery fails.
                    if let Err(e) = self.store.touch_last_triggered(event.rule_id, now).await {
                        tracing::warn!(
                            rule_id = event.rule_id,
                            error = %e,
                            "Failed to stamp last_triggered_at"
                        );
                    }

                    let rule_id = event.rule_id;
                    match self.scheduler.accept(event, &prefs, now).await {
                        ScheduleDecision::DispatchNow(event) => {
                            let channels = event.channels;
                            let payload = NotificationPayload::single(event.deal);
                            self.dispatcher
                                .dispatch(&prefs, &channels, Some(rule_id), &payload)
                                .await;
                        }
                        ScheduleDecision::Held(release) => {
                            tracing::debug!(
                                user_id = prefs.user_id,
                                rule_id,
                                release = %release,
                                "Match held for quiet hours"
                            );
                        }
                        ScheduleDecision::Digested => {
                            tracing::debug!(
                                user_id = prefs.user_id,
                                rule_id,
                                "Match banked for digest"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Dispatch everything the scheduler says is due: quiet-hours releases
    /// individually, digests as one notification per channel. A digest
    /// that fails on every channel goes back into the bucket.
    pub async fn flush_due(&self, now: Timestamp) -> Result<(), StoreError> {
        let pending = self.scheduler.pending_users().await;
        if pending.is_empty() {
            return Ok(());
        }
        let prefs_by_user = self.store.load_preferences(&pending).await?;
        let due = self.scheduler.collect_due(now, &prefs_by_user).await;

        for delivery in due {
            let fallback;
            let prefs = match prefs_by_user.get(&delivery.user_id) {
                Some(p) => p,
                None => {
                    fallback = NotificationPreferences::default_for(delivery.user_id);
                    &fallback
                }
            };

            let outcomes = self
                .dispatcher
                .dispatch(prefs, &delivery.channels, delivery.rule_id, &delivery.payload)
                .await;

            if let Some(events) = delivery.digest_events {
                let total_failure = !outcomes.is_empty() && outcomes.iter().all(|o| !o.sent);
                if total_failure {
                    tracing::warn!(
                        user_id = delivery.user_id,
                        deals = events.len(),
                        "Digest failed on every channel, restoring bucket for retry"
                    );
                    self.scheduler.restore_digest(delivery.user_id, events).await;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedAdapter;
    use crate::adapters::{AdapterError, AdapterSet};
    use crate::dispatcher::RetryPolicy;
    use crate::store::{AttemptStatus, MemoryAlertStore};
    use chrono::{NaiveTime, TimeZone};
    use flipscout_core::{AlertRule, ChannelKind, Condition, Deal, Frequency};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn deal(id: &str, title: &str) -> Deal {
        Deal {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            price: 450.0,
            condition: Condition::Good,
            category: "electronics".to_string(),
            deal_score: 0.8,
            latitude: None,
            longitude: None,
            distance_km: None,
            listed_at: utc(2025, 6, 2, 7, 0),
        }
    }

    fn rule(id: DbId, user_id: DbId, keyword: &str) -> AlertRule {
        AlertRule {
            id,
            user_id,
            name: format!("rule-{id}"),
            keywords: vec![keyword.to_string()],
            exclude_keywords: vec![],
            categories: vec![],
            min_condition: None,
            min_price: None,
            max_price: None,
            min_deal_score: None,
            location: None,
            radius_km: None,
            channels: vec![ChannelKind::Email],
            enabled: true,
            last_triggered_at: None,
            created_at: utc(2025, 6, 1, 0, 0),
            updated_at: utc(2025, 6, 1, 0, 0),
        }
    }

    fn email_prefs(user_id: DbId) -> NotificationPreferences {
        let mut p = NotificationPreferences::default_for(user_id);
        p.email = Some(format!("user{user_id}@example.com"));
        p
    }

    fn engine(store: Arc<MemoryAlertStore>, adapters: AdapterSet) -> AlertEngine {
        let dispatcher = Arc::new(
            ChannelDispatcher::new(store.clone(), adapters)
                .with_retry_policy(RetryPolicy::no_backoff()),
        );
        AlertEngine::new(store, dispatcher)
    }

    fn batch(deals: Vec<Deal>) -> DealBatch {
        DealBatch::new(deals)
    }

    // -- immediate path -------------------------------------------------------

    #[tokio::test]
    async fn matching_deal_is_delivered_immediately() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        store.set_preferences(email_prefs(1)).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        let now = utc(2025, 6, 2, 12, 0);
        let deals = vec![deal("d1", "Gaming laptop RTX"), deal("d2", "Old toaster")];
        eng.process_batch(&batch(deals), now).await.unwrap();

        assert_eq!(email.call_count(), 1);
        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Sent);
        assert_eq!(attempts[0].rule_id, Some(5));
        assert_eq!(store.rule(5).await.unwrap().last_triggered_at, Some(now));
    }

    #[tokio::test]
    async fn reprocessing_a_batch_sends_nothing_new() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        store.set_preferences(email_prefs(1)).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        let b = batch(vec![deal("d1", "Cheap laptop")]);
        eng.process_batch(&b, utc(2025, 6, 2, 12, 0)).await.unwrap();
        eng.process_batch(&b, utc(2025, 6, 2, 12, 5)).await.unwrap();

        assert_eq!(email.call_count(), 1);
        assert_eq!(store.attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_still_consumes_the_trigger() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        store.set_preferences(email_prefs(1)).await;
        let failures: Vec<Result<(), AdapterError>> = (0..4)
            .map(|_| Err(AdapterError::Transient("down".into())))
            .collect();
        let email = Arc::new(ScriptedAdapter::with_script(ChannelKind::Email, failures));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        let b = batch(vec![deal("d1", "Cheap laptop")]);
        let now = utc(2025, 6, 2, 12, 0);
        eng.process_batch(&b, now).await.unwrap();

        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        // At-most-once: the trigger is spent, so no replay on reprocess.
        eng.process_batch(&b, utc(2025, 6, 2, 12, 5)).await.unwrap();
        assert_eq!(store.attempts().await.len(), 1);
        assert_eq!(store.rule(5).await.unwrap().last_triggered_at, Some(now));
    }

    // -- rate cap -------------------------------------------------------------

    #[tokio::test]
    async fn daily_cap_suppresses_excess_matches_without_attempts() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        let mut prefs = email_prefs(1);
        prefs.max_per_day = 1;
        store.set_preferences(prefs).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        let deals = vec![deal("d1", "Laptop one"), deal("d2", "Laptop two")];
        eng.process_batch(&batch(deals), utc(2025, 6, 2, 12, 0))
            .await
            .unwrap();

        // The second match is dropped before dispatch: no attempt row.
        assert_eq!(email.call_count(), 1);
        assert_eq!(store.attempts().await.len(), 1);
    }

    // -- quiet hours ----------------------------------------------------------

    #[tokio::test]
    async fn quiet_hours_defer_dispatch_until_release() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        let mut prefs = email_prefs(1);
        prefs.quiet_hours_enabled = true;
        prefs.quiet_start = Some(t(22, 0));
        prefs.quiet_end = Some(t(8, 0));
        store.set_preferences(prefs).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        eng.process_batch(
            &batch(vec![deal("d1", "Night laptop")]),
            utc(2025, 6, 2, 23, 30),
        )
        .await
        .unwrap();
        assert_eq!(email.call_count(), 0);

        // Still quiet at 07:00.
        eng.flush_due(utc(2025, 6, 3, 7, 0)).await.unwrap();
        assert_eq!(email.call_count(), 0);

        eng.flush_due(utc(2025, 6, 3, 8, 1)).await.unwrap();
        assert_eq!(email.call_count(), 1);
        assert_eq!(store.attempts().await[0].status, AttemptStatus::Sent);
    }

    // -- digest ---------------------------------------------------------------

    #[tokio::test]
    async fn digest_batches_matches_into_one_notification() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        let mut prefs = email_prefs(1);
        prefs.frequency = Frequency::Daily;
        prefs.digest_time = Some(t(9, 0));
        store.set_preferences(prefs).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        let deals = vec![
            deal("d1", "Laptop one"),
            deal("d2", "Laptop two"),
            deal("d3", "Laptop three"),
        ];
        eng.process_batch(&batch(deals), utc(2025, 6, 2, 10, 0))
            .await
            .unwrap();
        assert_eq!(email.call_count(), 0);

        eng.flush_due(utc(2025, 6, 3, 9, 1)).await.unwrap();
        assert_eq!(email.call_count(), 1);
        assert_eq!(email.payloads()[0].deal_count(), 3);

        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].rule_id, None);
    }

    #[tokio::test]
    async fn failed_digest_is_retried_on_the_next_tick() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        let mut prefs = email_prefs(1);
        prefs.frequency = Frequency::Daily;
        prefs.digest_time = Some(t(9, 0));
        store.set_preferences(prefs).await;
        // First flush exhausts its retries; the retry flush succeeds.
        let failures: Vec<Result<(), AdapterError>> = (0..4)
            .map(|_| Err(AdapterError::Transient("down".into())))
            .collect();
        let email = Arc::new(ScriptedAdapter::with_script(ChannelKind::Email, failures));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        eng.process_batch(
            &batch(vec![deal("d1", "Laptop one"), deal("d2", "Laptop two")]),
            utc(2025, 6, 2, 8, 0),
        )
        .await
        .unwrap();

        eng.flush_due(utc(2025, 6, 2, 9, 1)).await.unwrap();
        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);

        eng.flush_due(utc(2025, 6, 2, 9, 2)).await.unwrap();
        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].status, AttemptStatus::Sent);
        // The retried digest still carries both deals.
        assert_eq!(email.payloads().last().unwrap().deal_count(), 2);
    }

    #[tokio::test]
    async fn partially_delivered_digest_is_not_retried() {
        let store = Arc::new(MemoryAlertStore::new());
        let mut r = rule(5, 1, "laptop");
        r.channels = vec![ChannelKind::Email, ChannelKind::Discord];
        store.add_rule(r).await;
        let mut prefs = email_prefs(1);
        prefs.frequency = Frequency::Daily;
        prefs.digest_time = Some(t(9, 0));
        prefs.channels = vec![ChannelKind::Email, ChannelKind::Discord];
        prefs.discord_webhook_url = Some("https://discord.example/hook".to_string());
        store.set_preferences(prefs).await;
        let email = Arc::new(ScriptedAdapter::with_script(
            ChannelKind::Email,
            vec![Err(AdapterError::Permanent("mailbox gone".into()))],
        ));
        let discord = Arc::new(ScriptedAdapter::ok(ChannelKind::Discord));
        let eng = engine(
            store.clone(),
            AdapterSet::new().with(email).with(discord.clone()),
        );

        eng.process_batch(&batch(vec![deal("d1", "Laptop one")]), utc(2025, 6, 2, 8, 0))
            .await
            .unwrap();
        eng.flush_due(utc(2025, 6, 2, 9, 1)).await.unwrap();

        // One channel made it, so the digest is considered delivered.
        eng.flush_due(utc(2025, 6, 2, 9, 2)).await.unwrap();
        assert_eq!(discord.call_count(), 1);
        assert_eq!(store.attempts().await.len(), 2);
    }

    // -- matching scope -------------------------------------------------------

    #[tokio::test]
    async fn disabled_rules_never_match() {
        let store = Arc::new(MemoryAlertStore::new());
        let mut r = rule(5, 1, "laptop");
        r.enabled = false;
        store.add_rule(r).await;
        store.set_preferences(email_prefs(1)).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        eng.process_batch(&batch(vec![deal("d1", "Laptop")]), utc(2025, 6, 2, 12, 0))
            .await
            .unwrap();
        assert_eq!(email.call_count(), 0);
        assert!(store.attempts().await.is_empty());
    }

    #[tokio::test]
    async fn independent_users_each_get_their_notification() {
        let store = Arc::new(MemoryAlertStore::new());
        store.add_rule(rule(5, 1, "laptop")).await;
        store.add_rule(rule(6, 2, "laptop")).await;
        store.set_preferences(email_prefs(1)).await;
        store.set_preferences(email_prefs(2)).await;
        let email = Arc::new(ScriptedAdapter::ok(ChannelKind::Email));
        let eng = engine(store.clone(), AdapterSet::new().with(email.clone()));

        eng.process_batch(&batch(vec![deal("d1", "Laptop")]), utc(2025, 6, 2, 12, 0))
            .await
            .unwrap();

        assert_eq!(email.call_count(), 2);
        assert_eq!(store.attempts_for(1).await.len(), 1);
        assert_eq!(store.attempts_for(2).await.len(), 1);
    }
}
