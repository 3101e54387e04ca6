//! HTTP-level tests for request validation on the write endpoints.
//!
//! Handlers validate payloads before touching the database, so every
//! rejection here is observable without Postgres: the lazy test pool
//! never connects, and the request must still come back 400 with the
//! standard error envelope.

mod common;

use axum::http::StatusCode;
use common::{assert_error_response, body_json, build_test_app, post_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: POST rules with a blank name returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rule_with_blank_name_returns_400() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/users/1/rules",
        json!({
            "name": "   ",
            "keywords": ["thinkpad"],
            "channels": ["email"]
        }),
    )
    .await;

    assert_error_response(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

// ---------------------------------------------------------------------------
// Test: POST rules with an inverted price range returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rule_with_inverted_price_range_returns_400() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/users/1/rules",
        json!({
            "name": "Cheap laptops",
            "min_price": 500.0,
            "max_price": 100.0,
            "channels": ["email"]
        }),
    )
    .await;

    assert_error_response(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

// ---------------------------------------------------------------------------
// Test: POST rules with an unknown channel returns 400 naming the channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rule_with_unknown_channel_returns_400() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/users/1/rules",
        json!({
            "name": "Laptops",
            "channels": ["email", "carrier-pigeon"]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("carrier-pigeon"),
        "error should name the offending channel, got: {}",
        json["error"]
    );
}

// ---------------------------------------------------------------------------
// Test: POST rules enabled with no channels returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_enabled_rule_without_channels_returns_400() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/users/1/rules",
        json!({
            "name": "Laptops",
            "enabled": true,
            "channels": []
        }),
    )
    .await;

    assert_error_response(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

// ---------------------------------------------------------------------------
// Test: POST rules with an out-of-range deal score returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rule_with_out_of_range_score_returns_400() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/users/1/rules",
        json!({
            "name": "Only great deals",
            "min_deal_score": 1.5,
            "channels": ["email"]
        }),
    )
    .await;

    assert_error_response(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

// ---------------------------------------------------------------------------
// Test: POST channel test with an unknown channel kind returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn channel_test_with_unknown_kind_returns_400() {
    let app = build_test_app();
    let response = post_json(app, "/api/v1/users/1/channels/fax/test", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(
        json["error"].as_str().unwrap().contains("fax"),
        "error should name the unknown channel, got: {}",
        json["error"]
    );
}

// ---------------------------------------------------------------------------
// Test: POST deals/batch with an empty deals array returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_empty_batch_returns_400() {
    let app = build_test_app();
    let response = post_json(app, "/api/v1/deals/batch", json!({ "deals": [] })).await;

    assert_error_response(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

// ---------------------------------------------------------------------------
// Test: POST rules with a malformed JSON body is rejected by the extractor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rule_with_missing_name_is_rejected() {
    let app = build_test_app();

    // "name" is required by the DTO, so deserialization itself fails before
    // the handler runs. Axum answers 422 for JSON that parses but does not
    // match the target type.
    let response = post_json(
        app,
        "/api/v1/users/1/rules",
        json!({ "channels": ["email"] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
