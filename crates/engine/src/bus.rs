//! Broadcast bus carrying ingested deal batches to the alert engine.

use flipscout_core::types::Timestamp;
use flipscout_core::Deal;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default broadcast channel capacity. Slow consumers past this many
/// undelivered batches start lagging and skip ahead.
pub const DEFAULT_CAPACITY: usize = 64;

/// A batch of deals accepted by the ingest endpoint in one request.
#[derive(Debug, Clone)]
pub struct DealBatch {
    pub batch_id: Uuid,
    pub deals: Vec<Deal>,
    pub received_at: Timestamp,
}

impl DealBatch {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            deals,
            received_at: chrono::Utc::now(),
        }
    }
}

/// Fan-out channel between deal ingestion and the alert engine.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct DealBus {
    sender: broadcast::Sender<DealBatch>,
}

impl DealBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a batch to all current subscribers.
    ///
    /// A batch published while no subscriber is listening is dropped,
    /// which only happens during startup and shutdown windows.
    pub fn publish(&self, batch: DealBatch) {
        let receivers = self.sender.receiver_count();
        if let Err(e) = self.sender.send(batch) {
            tracing::debug!(error = %e, "Deal batch dropped, no active subscribers");
        } else {
            tracing::trace!(receivers, "Deal batch published");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DealBatch> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DealBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
