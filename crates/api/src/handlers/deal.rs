//! Handlers for the `/deals` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flipscout_core::deal::Deal;
use flipscout_core::error::CoreError;
use flipscout_db::repositories::DealRepo;
use flipscout_engine::DealBatch;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /deals/batch`.
#[derive(Debug, Deserialize)]
pub struct IngestBatch {
    pub deals: Vec<Deal>,
}

/// Receipt returned once a batch is persisted and handed to the engine.
#[derive(Debug, Serialize)]
pub struct IngestReceipt {
    pub batch_id: Uuid,
    /// Deals in the submitted batch.
    pub received: usize,
    /// Rows written by the upsert (new and refreshed listings).
    pub written: u64,
}

/// POST /api/v1/deals/batch
///
/// Persist a scan batch, then publish it to the alert engine. Matching
/// and delivery run asynchronously; failures there are logged, never
/// reported back to the scanner.
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(input): Json<IngestBatch>,
) -> AppResult<(StatusCode, Json<DataResponse<IngestReceipt>>)> {
    if input.deals.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Deal batch must contain at least one deal".into(),
        )));
    }

    // Persist before publishing so rule tests and the matching pass see
    // the same listings.
    let written = DealRepo::upsert_batch(&state.pool, &input.deals).await?;

    let batch = DealBatch::new(input.deals);
    let receipt = IngestReceipt {
        batch_id: batch.batch_id,
        received: batch.deals.len(),
        written,
    };
    tracing::info!(
        batch_id = %receipt.batch_id,
        deals = receipt.received,
        written,
        "Deal batch ingested"
    );
    state.bus.publish(batch);

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: receipt })))
}
