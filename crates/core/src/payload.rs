//! Notification payload shapes and their plain-text rendering.
//!
//! The dispatcher snapshots the payload as JSON onto every
//! `NotificationAttempt`, and every channel adapter renders it with the
//! helpers here so email, Discord, SMS, and push all agree on wording.

use serde::{Deserialize, Serialize};

use crate::deal::{Condition, Deal};

/// Character budget for the SMS rendering.
pub const SMS_TEXT_LIMIT: usize = 140;

/// The slice of a matched deal that notifications carry. Captured at match
/// time so later edits to the listing never rewrite what was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSummary {
    pub deal_id: String,
    pub title: String,
    pub price: f64,
    pub condition: Condition,
    pub category: String,
    pub deal_score: f64,
    /// Name of the rule that matched, so digests spanning rules stay
    /// attributable.
    pub rule_name: String,
}

impl DealSummary {
    pub fn from_deal(deal: &Deal, rule_name: &str) -> Self {
        Self {
            deal_id: deal.id.clone(),
            title: deal.title.clone(),
            price: deal.price,
            condition: deal.condition,
            category: deal.category.clone(),
            deal_score: deal.deal_score,
            rule_name: rule_name.to_string(),
        }
    }

    /// One-line rendering used in digest bodies.
    fn line(&self) -> String {
        format!(
            "{} - ${:.2} ({}, score {:.2}) [{}]",
            self.title, self.price, self.condition, self.deal_score, self.rule_name
        )
    }
}

/// What a single dispatch carries: one deal in immediate mode, the whole
/// held bucket in digest mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// One matched deal delivered on its own.
    Single { deal: DealSummary },
    /// Every match held since the previous digest flush.
    Digest { deals: Vec<DealSummary> },
}

impl NotificationPayload {
    pub fn single(deal: DealSummary) -> Self {
        NotificationPayload::Single { deal }
    }

    pub fn digest(deals: Vec<DealSummary>) -> Self {
        NotificationPayload::Digest { deals }
    }

    /// Number of deals this payload covers.
    pub fn deal_count(&self) -> usize {
        match self {
            NotificationPayload::Single { .. } => 1,
            NotificationPayload::Digest { deals } => deals.len(),
        }
    }

    /// Subject line, used for email subjects and push titles.
    pub fn subject(&self) -> String {
        match self {
            NotificationPayload::Single { deal } => format!("Deal alert: {}", deal.title),
            NotificationPayload::Digest { deals } => {
                let n = deals.len();
                let noun = if n == 1 { "match" } else { "matches" };
                format!("Deal digest: {n} new {noun}")
            }
        }
    }

    /// Multi-line plain-text body, used for email and Discord.
    pub fn body_text(&self) -> String {
        match self {
            NotificationPayload::Single { deal } => format!(
                "{}\nPrice: ${:.2}\nCondition: {}\nCategory: {}\nDeal score: {:.2}\nMatched rule: {}",
                deal.title, deal.price, deal.condition, deal.category, deal.deal_score,
                deal.rule_name
            ),
            NotificationPayload::Digest { deals } => {
                let mut body = self.subject();
                for deal in deals {
                    body.push('\n');
                    body.push_str(&deal.line());
                }
                body
            }
        }
    }

    /// Single-line rendering capped at [`SMS_TEXT_LIMIT`] characters.
    pub fn short_text(&self) -> String {
        let line = match self {
            NotificationPayload::Single { deal } => {
                format!("Deal alert: {}", deal.line())
            }
            NotificationPayload::Digest { .. } => self.subject(),
        };
        if line.chars().count() > SMS_TEXT_LIMIT {
            line.chars().take(SMS_TEXT_LIMIT).collect()
        } else {
            line
        }
    }
}
