//! Deal alert engine: matching, trigger bookkeeping, delivery scheduling
//! and channel dispatch.
//!
//! The engine consumes [`DealBatch`]es from the [`DealBus`], runs every
//! enabled rule against every deal in the batch, and walks each match
//! through the delivery pipeline:
//!
//! 1. [`TriggerTracker`] reserves the trigger (dedup + daily rate cap).
//! 2. [`DeliveryScheduler`] decides between immediate dispatch, quiet-hours
//!    deferral and digest batching.
//! 3. [`ChannelDispatcher`] fans out to the configured channel adapters
//!    with retry and attempt bookkeeping.
//!
//! All persistence goes through the [`AlertStore`] trait so the pipeline
//! can run against Postgres in production and an in-memory store in tests.

pub mod adapters;
pub mod bus;
pub mod dispatcher;
pub mod engine;
pub mod scheduler;
pub mod store;
pub mod tracker;

pub use adapters::{AdapterError, AdapterSet, ChannelAdapter};
pub use bus::{DealBatch, DealBus};
pub use dispatcher::{ChannelDispatcher, DispatchOutcome, RetryPolicy};
pub use engine::{AlertEngine, DEFAULT_TICK_INTERVAL};
pub use scheduler::{DeliveryScheduler, MatchEvent, ScheduleDecision};
pub use store::{
    AlertStore, MatchTargets, MemoryAlertStore, PgAlertStore, StoreError, TriggerReservation,
};
pub use tracker::TriggerTracker;
