//! Deal entity model.
//!
//! Ingest accepts [`flipscout_core::Deal`] directly as its wire shape, so
//! there is no separate create DTO here.

use serde::Serialize;
use sqlx::FromRow;

use flipscout_core::deal::{Condition, Deal};
use flipscout_core::error::CoreError;
use flipscout_core::types::Timestamp;

/// A row from the `deals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DealRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub condition: String,
    pub category: String,
    pub deal_score: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_km: Option<f64>,
    pub listed_at: Timestamp,
    pub ingested_at: Timestamp,
}

impl DealRow {
    /// Convert into the domain value the matcher consumes. Fails only on
    /// a corrupt `condition` column.
    pub fn to_core(&self) -> Result<Deal, CoreError> {
        Ok(Deal {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            condition: self.condition.parse::<Condition>()?,
            category: self.category.clone(),
            deal_score: self.deal_score,
            latitude: self.latitude,
            longitude: self.longitude,
            distance_km: self.distance_km,
            listed_at: self.listed_at,
        })
    }
}
