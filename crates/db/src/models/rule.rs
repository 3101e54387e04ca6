//! Alert rule entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use flipscout_core::channels::parse_channels;
use flipscout_core::deal::Condition;
use flipscout_core::error::CoreError;
use flipscout_core::rule::AlertRule;
use flipscout_core::types::{DbId, Timestamp};

/// A row from the `alert_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertRuleRow {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub categories: Vec<String>,
    pub min_condition: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_deal_score: Option<f64>,
    pub location: Option<String>,
    pub radius_km: Option<f64>,
    pub channels: Vec<String>,
    pub enabled: bool,
    pub last_triggered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AlertRuleRow {
    /// Convert into the domain rule the matcher consumes. Fails only on
    /// corrupt `min_condition` or `channels` columns.
    pub fn to_core(&self) -> Result<AlertRule, CoreError> {
        let min_condition = self
            .min_condition
            .as_deref()
            .map(str::parse::<Condition>)
            .transpose()?;
        Ok(AlertRule {
            id: self.id,
            user_id: self.user_id,
            name: self.name.clone(),
            keywords: self.keywords.clone(),
            exclude_keywords: self.exclude_keywords.clone(),
            categories: self.categories.clone(),
            min_condition,
            min_price: self.min_price,
            max_price: self.max_price,
            min_deal_score: self.min_deal_score,
            location: self.location.clone(),
            radius_km: self.radius_km,
            channels: parse_channels(&self.channels)?,
            enabled: self.enabled,
            last_triggered_at: self.last_triggered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DTO for creating a rule. Collection fields default to empty; `enabled`
/// defaults to true.
#[derive(Debug, Deserialize)]
pub struct CreateAlertRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub min_condition: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_deal_score: Option<f64>,
    pub location: Option<String>,
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub channels: Vec<String>,
    pub enabled: Option<bool>,
}

/// DTO for updating a rule. All fields optional; absent fields keep their
/// stored value. Passing an empty list clears a collection field.
#[derive(Debug, Deserialize)]
pub struct UpdateAlertRule {
    pub name: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub exclude_keywords: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub min_condition: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_deal_score: Option<f64>,
    pub location: Option<String>,
    pub radius_km: Option<f64>,
    pub channels: Option<Vec<String>>,
    pub enabled: Option<bool>,
}
