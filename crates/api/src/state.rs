use std::sync::Arc;

use flipscout_engine::{ChannelDispatcher, DealBus};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: flipscout_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Broadcast hub carrying ingested deal batches to the alert engine.
    pub bus: DealBus,
    /// Dispatcher backing the synchronous channel-test endpoint. The
    /// engine holds its own clone for regular deliveries.
    pub dispatcher: Arc<ChannelDispatcher>,
}
