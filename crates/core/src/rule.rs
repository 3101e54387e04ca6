//! User-defined deal alert rules and their validation.
//!
//! A rule is a bag of optional criteria. "Unset" (None / empty list) never
//! vetoes, so a rule with nothing set is a legitimate catch-all. Validation
//! here guards the shapes that must never reach storage: inverted price
//! bounds, out-of-range scores, and enabled rules with no channel to
//! deliver on.

use crate::channels::ChannelKind;
use crate::deal::Condition;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum accepted rule name length, in characters.
pub const MAX_RULE_NAME_LEN: usize = 120;

/// A deal alert rule owned by one user. Identity is immutable; criteria
/// and the `enabled` flag change over the rule's lifetime.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    /// OR-matched, case-insensitive substrings over title + description.
    pub keywords: Vec<String>,
    /// Any match vetoes the deal, regardless of other criteria.
    pub exclude_keywords: Vec<String>,
    /// OR-matched category names; empty means any category.
    pub categories: Vec<String>,
    pub min_condition: Option<Condition>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_deal_score: Option<f64>,
    /// Free-form location label; advisory only.
    pub location: Option<String>,
    /// Applied only against deals that carry an upstream-computed distance.
    pub radius_km: Option<f64>,
    pub channels: Vec<ChannelKind>,
    pub enabled: bool,
    pub last_triggered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AlertRule {
    /// Validate the full criteria set. Called before any create or update
    /// is persisted, and again when a paused rule is resumed.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_rule_name(&self.name)?;
        validate_price_range(self.min_price, self.max_price)?;
        if let Some(score) = self.min_deal_score {
            validate_deal_score(score)?;
        }
        if let Some(radius) = self.radius_km {
            validate_radius(radius)?;
        }
        validate_channels(&self.channels, self.enabled)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Field validators
// ---------------------------------------------------------------------------

/// Validate a rule name: non-blank, within length bounds.
pub fn validate_rule_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Rule name must not be blank".into()));
    }
    if trimmed.chars().count() > MAX_RULE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Rule name must be at most {MAX_RULE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate optional price bounds: non-negative, finite, min <= max when
/// both are set.
pub fn validate_price_range(min: Option<f64>, max: Option<f64>) -> Result<(), CoreError> {
    for (label, value) in [("min_price", min), ("max_price", max)] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(CoreError::Validation(format!(
                    "{label} must be a non-negative number, got {v}"
                )));
            }
        }
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(CoreError::Validation(format!(
                "min_price ({lo}) must be <= max_price ({hi})"
            )));
        }
    }
    Ok(())
}

/// Validate a minimum deal score: must be inside `[0, 1]`.
pub fn validate_deal_score(score: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(CoreError::Validation(format!(
            "min_deal_score must be between 0.0 and 1.0, got {score}"
        )));
    }
    Ok(())
}

/// Validate a search radius: strictly positive and finite.
pub fn validate_radius(radius_km: f64) -> Result<(), CoreError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(CoreError::Validation(format!(
            "radius_km must be a positive number, got {radius_km}"
        )));
    }
    Ok(())
}

/// An enabled rule with no channels would match deals and then have nowhere
/// to deliver; reject that shape. Paused rules may have empty channels.
pub fn validate_channels(channels: &[ChannelKind], enabled: bool) -> Result<(), CoreError> {
    if enabled && channels.is_empty() {
        return Err(CoreError::Validation(
            "An enabled rule needs at least one notification channel".into(),
        ));
    }
    Ok(())
}

/// Trim keyword entries and drop the ones that end up blank, preserving
/// order. Matching lowercases at comparison time, so original casing is
/// kept for display.
pub fn normalize_keywords(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
