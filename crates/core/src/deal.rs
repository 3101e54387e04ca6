//! Marketplace listing snapshots consumed from the scan pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Listing condition on an ordinal scale.
///
/// `Ord` follows declaration order, so `Condition::Good >= Condition::Fair`
/// holds and rule minimums are a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Poor,
    Fair,
    Good,
    Great,
    Excellent,
}

impl Condition {
    /// Stable lowercase name used in storage and ingest payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Poor => "poor",
            Condition::Fair => "fair",
            Condition::Good => "good",
            Condition::Great => "great",
            Condition::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poor" => Ok(Condition::Poor),
            "fair" => Ok(Condition::Fair),
            "good" => Ok(Condition::Good),
            "great" => Ok(Condition::Great),
            "excellent" => Ok(Condition::Excellent),
            other => Err(CoreError::Validation(format!(
                "Unknown condition: '{other}'. Valid conditions: poor, fair, good, great, excellent"
            ))),
        }
    }
}

/// A single marketplace listing after scoring.
///
/// `id` is the marketplace's own listing id. The same listing showing up in
/// a later scan keeps its id, which is exactly what trigger dedup keys on.
/// Deals are immutable values for the duration of a matching pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub condition: Condition,
    pub category: String,
    /// Resale opportunity score in `[0, 1]` from the pricing model.
    pub deal_score: f64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Distance from the scanning location, when the scan had one
    /// configured. Radius rules only apply when this is present.
    #[serde(default)]
    pub distance_km: Option<f64>,
    pub listed_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- condition ordering ---------------------------------------------------

    #[test]
    fn condition_rank_is_ordinal() {
        assert!(Condition::Poor < Condition::Fair);
        assert!(Condition::Fair < Condition::Good);
        assert!(Condition::Good < Condition::Great);
        assert!(Condition::Great < Condition::Excellent);
    }

    #[test]
    fn condition_minimum_comparison() {
        assert!(Condition::Great >= Condition::Good);
        assert!(Condition::Fair >= Condition::Fair);
        assert!(Condition::Poor < Condition::Good);
    }

    // -- parsing --------------------------------------------------------------

    #[test]
    fn condition_round_trips() {
        for c in [
            Condition::Poor,
            Condition::Fair,
            Condition::Good,
            Condition::Great,
            Condition::Excellent,
        ] {
            assert_eq!(c.as_str().parse::<Condition>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_condition_rejected() {
        assert!("mint".parse::<Condition>().is_err());
    }

    // -- serde ----------------------------------------------------------------

    #[test]
    fn deal_deserializes_with_optional_fields_absent() {
        let json = r#"{
            "id": "fb-123",
            "title": "Gaming laptop",
            "price": 750.0,
            "condition": "good",
            "category": "electronics",
            "deal_score": 0.8,
            "listed_at": "2025-06-01T12:00:00Z"
        }"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.id, "fb-123");
        assert_eq!(deal.description, "");
        assert_eq!(deal.condition, Condition::Good);
        assert!(deal.distance_km.is_none());
    }
}
