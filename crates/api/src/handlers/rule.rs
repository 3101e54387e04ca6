//! Handlers for the `/users/{user_id}/rules` resource.
//!
//! Every write validates before the first database round-trip, so a
//! malformed payload is rejected without touching storage.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use flipscout_core::channels::parse_channels;
use flipscout_core::deal::Condition;
use flipscout_core::error::CoreError;
use flipscout_core::matcher;
use flipscout_core::payload::DealSummary;
use flipscout_core::rule::{
    normalize_keywords, validate_channels, validate_deal_score, validate_price_range,
    validate_radius, validate_rule_name,
};
use flipscout_core::types::DbId;
use flipscout_db::models::rule::{AlertRuleRow, CreateAlertRule, UpdateAlertRule};
use flipscout_db::repositories::{DealRepo, RuleRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::ensure_user_exists;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

/// Query parameters for `POST .../rules/{rule_id}/test`.
#[derive(Debug, Deserialize)]
pub struct RuleTestQuery {
    /// How many recent deals to evaluate. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
}

/// Default number of recent deals a rule test scans.
const DEFAULT_TEST_DEALS: i64 = 50;

/// Upper bound on the rule-test scan size.
const MAX_TEST_DEALS: i64 = 200;

/// Outcome of a rule dry-run.
#[derive(Debug, Serialize)]
pub struct RuleTestReport {
    /// Number of stored deals the rule was evaluated against.
    pub scanned: usize,
    /// The deals the rule would have matched, newest first.
    pub matched: Vec<DealSummary>,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/users/{user_id}/rules
pub async fn create(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Json(input): Json<CreateAlertRule>,
) -> AppResult<(StatusCode, Json<DataResponse<AlertRuleRow>>)> {
    let input = validate_create(input)?;
    ensure_user_exists(&state, user_id).await?;

    let rule = RuleRepo::create(&state.pool, user_id, &input).await?;
    tracing::info!(user_id, rule_id = rule.id, name = %rule.name, "Alert rule created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: rule })))
}

/// GET /api/v1/users/{user_id}/rules
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<AlertRuleRow>>>> {
    let rules = RuleRepo::list_for_user(&state.pool, user_id).await?;
    Ok(Json(DataResponse { data: rules }))
}

/// GET /api/v1/users/{user_id}/rules/{rule_id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path((user_id, rule_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<AlertRuleRow>>> {
    let rule = RuleRepo::get(&state.pool, user_id, rule_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;
    Ok(Json(DataResponse { data: rule }))
}

/// PUT /api/v1/users/{user_id}/rules/{rule_id}
///
/// Field-scoped update: absent fields keep their stored values. The
/// merged result is validated as a whole before anything is written.
pub async fn update(
    State(state): State<AppState>,
    Path((user_id, rule_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateAlertRule>,
) -> AppResult<Json<DataResponse<AlertRuleRow>>> {
    let current = RuleRepo::get(&state.pool, user_id, rule_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;

    let input = validate_update(input, &current)?;

    let updated = RuleRepo::update(&state.pool, user_id, rule_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/users/{user_id}/rules/{rule_id}
///
/// Removes the rule and, via cascade, its trigger history.
pub async fn delete(
    State(state): State<AppState>,
    Path((user_id, rule_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    let deleted = RuleRepo::delete(&state.pool, user_id, rule_id).await?;
    if deleted {
        tracing::info!(user_id, rule_id, "Alert rule deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))
    }
}

// ---------------------------------------------------------------------------
// Pause / resume / test
// ---------------------------------------------------------------------------

/// POST /api/v1/users/{user_id}/rules/{rule_id}/pause
pub async fn pause(
    State(state): State<AppState>,
    Path((user_id, rule_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<AlertRuleRow>>> {
    let rule = RuleRepo::set_enabled(&state.pool, user_id, rule_id, false)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;
    Ok(Json(DataResponse { data: rule }))
}

/// POST /api/v1/users/{user_id}/rules/{rule_id}/resume
///
/// Re-validates the channel list first: a paused rule may have had its
/// channels emptied, and resuming it like that would match deals with
/// nowhere to deliver them.
pub async fn resume(
    State(state): State<AppState>,
    Path((user_id, rule_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<AlertRuleRow>>> {
    let current = RuleRepo::get(&state.pool, user_id, rule_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;

    let channels = parse_channels(&current.channels)?;
    validate_channels(&channels, true)?;

    let rule = RuleRepo::set_enabled(&state.pool, user_id, rule_id, true)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;
    Ok(Json(DataResponse { data: rule }))
}

/// POST /api/v1/users/{user_id}/rules/{rule_id}/test
///
/// Dry-run the rule against recently ingested deals. No triggers are
/// reserved, no attempts are written, and `last_triggered_at` stays put.
pub async fn test(
    State(state): State<AppState>,
    Path((user_id, rule_id)): Path<(DbId, DbId)>,
    Query(params): Query<RuleTestQuery>,
) -> AppResult<Json<DataResponse<RuleTestReport>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TEST_DEALS)
        .clamp(1, MAX_TEST_DEALS);

    let row = RuleRepo::get(&state.pool, user_id, rule_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert rule",
            id: rule_id,
        }))?;
    let rule = row.to_core().map_err(|e| {
        AppError::InternalError(format!("Stored rule {rule_id} is unreadable: {e}"))
    })?;

    let deals = DealRepo::recent(&state.pool, limit).await?;
    let scanned = deals.len();

    let mut matched = Vec::new();
    for deal_row in &deals {
        let deal = match deal_row.to_core() {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    deal_id = %deal_row.id,
                    error = %e,
                    "Skipping unreadable deal in rule test"
                );
                continue;
            }
        };
        if matcher::rule_matches(&rule, &deal) {
            matched.push(DealSummary::from_deal(&deal, &rule.name));
        }
    }

    Ok(Json(DataResponse {
        data: RuleTestReport { scanned, matched },
    }))
}

// ---------------------------------------------------------------------------
// Payload validation
// ---------------------------------------------------------------------------

/// Check every criteria field of a create payload and normalize the
/// keyword lists. Nothing touches the database until this passes.
fn validate_create(input: CreateAlertRule) -> Result<CreateAlertRule, AppError> {
    validate_rule_name(&input.name)?;
    validate_price_range(input.min_price, input.max_price)?;
    if let Some(score) = input.min_deal_score {
        validate_deal_score(score)?;
    }
    if let Some(radius) = input.radius_km {
        validate_radius(radius)?;
    }
    if let Some(raw) = input.min_condition.as_deref() {
        raw.parse::<Condition>()?;
    }
    let channels = parse_channels(&input.channels)?;
    validate_channels(&channels, input.enabled.unwrap_or(true))?;

    Ok(CreateAlertRule {
        name: input.name.trim().to_string(),
        keywords: normalize_keywords(&input.keywords),
        exclude_keywords: normalize_keywords(&input.exclude_keywords),
        ..input
    })
}

/// Validate an update payload against the merge of `current` and the
/// payload, normalizing keyword lists. Cross-field checks (price range,
/// channels versus enabled) run on the merged values so an update can
/// never leave the stored rule invalid.
fn validate_update(
    input: UpdateAlertRule,
    current: &AlertRuleRow,
) -> Result<UpdateAlertRule, AppError> {
    let name = input.name.as_deref().unwrap_or(&current.name);
    validate_rule_name(name)?;

    let min_price = input.min_price.or(current.min_price);
    let max_price = input.max_price.or(current.max_price);
    validate_price_range(min_price, max_price)?;

    if let Some(score) = input.min_deal_score.or(current.min_deal_score) {
        validate_deal_score(score)?;
    }
    if let Some(radius) = input.radius_km.or(current.radius_km) {
        validate_radius(radius)?;
    }
    if let Some(raw) = input.min_condition.as_deref() {
        raw.parse::<Condition>()?;
    }

    let merged_channels = match &input.channels {
        Some(list) => parse_channels(list)?,
        None => parse_channels(&current.channels)?,
    };
    let enabled = input.enabled.unwrap_or(current.enabled);
    validate_channels(&merged_channels, enabled)?;

    Ok(UpdateAlertRule {
        name: input.name.map(|n| n.trim().to_string()),
        keywords: input.keywords.as_deref().map(normalize_keywords),
        exclude_keywords: input.exclude_keywords.as_deref().map(normalize_keywords),
        ..input
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
