//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use coedit_api::error::AppError;
use coedit_core::error::CoreError;
use coedit_db::StoreError;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError variants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Lock",
        id: "A1".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Lock with id A1 not found");
}

#[tokio::test]
async fn forbidden_error_returns_403() {
    let err = AppError::Core(CoreError::Forbidden("Admin role required".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
    assert_eq!(json["error"], "Admin role required");
}

#[tokio::test]
async fn unauthorized_error_returns_401() {
    let err = AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn core_internal_error_hides_details() {
    let err = AppError::Core(CoreError::Internal("secret detail".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: store failures map to 503
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_error_returns_503_without_details() {
    let err = AppError::Store(StoreError::Unavailable("connection refused".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "STORE_UNAVAILABLE");
    assert!(!json["error"].as_str().unwrap().contains("connection refused"));
}

// ---------------------------------------------------------------------------
// Test: HTTP-specific variants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("resource_id must not be empty".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "resource_id must not be empty");
}

#[tokio::test]
async fn rate_limited_error_returns_429() {
    let err = AppError::RateLimited { retry_after_ms: 42 };

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "RATE_LIMITED");
    assert!(json["error"].as_str().unwrap().contains("42 ms"));
}
