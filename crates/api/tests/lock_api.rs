//! HTTP tests for the lock and cursor endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{build_test_app, get, post_json, send, token};
use serde_json::json;

const A1: &str = "/api/v1/resources/A1";

// ---------------------------------------------------------------------------
// Test: health and authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_store_status() {
    let (app, _) = build_test_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_healthy"], true);
    assert_eq!(json["ws_connections"], 0);
}

#[tokio::test]
async fn missing_token_returns_401() {
    let (app, _) = build_test_app();
    let request = Request::builder()
        .uri(format!("{A1}/lock"))
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn invalid_token_returns_401() {
    let (app, _) = build_test_app();

    let (status, _) = get(&app, &format!("{A1}/lock"), "not-a-jwt").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_resource_id_returns_400() {
    let (app, _) = build_test_app();

    let (status, json) = get(&app, "/api/v1/resources/bad$id/lock", &token("u1", "user")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: acquire, conflict, release, re-acquire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_conflict_release_cycle() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");
    let u2 = token("u2", "user");

    let (status, json) = post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["success"], true);
    assert_eq!(json["data"]["lock"]["holder_id"], "u1");
    assert_eq!(json["data"]["lock"]["version"], 1);
    assert_eq!(json["data"]["lock"]["holder_info"]["name"], "User u1");

    let (status, json) = post_json(&app, &format!("{A1}/lock/acquire"), &u2, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["data"]["success"], false);
    let details = &json["data"]["conflict_details"];
    assert_eq!(details["current_version"], 1);
    assert_eq!(details["conflicting_holder"]["user_id"], "u1");
    assert_eq!(details["conflicting_holder"]["name"], "User u1");
    assert_eq!(details["conflicting_holder"]["email"], "u1@example.com");
    assert!(details["remaining_seconds"].as_i64().unwrap() > 0);
    assert!(json["data"]["message"]
        .as_str()
        .unwrap()
        .contains("User u1"));

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/release"),
        &u1,
        json!({ "expected_version": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["success"], true);

    let (status, json) = post_json(&app, &format!("{A1}/lock/acquire"), &u2, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["lock"]["holder_id"], "u2");
    assert_eq!(json["data"]["lock"]["version"], 2);
}

#[tokio::test]
async fn acquire_with_stale_version_reports_expected_version() {
    let (app, _) = build_test_app();
    post_json(&app, &format!("{A1}/lock/acquire"), &token("u1", "user"), json!({})).await;

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/acquire"),
        &token("u2", "user"),
        json!({ "expected_version": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["data"]["conflict_details"]["expected_version"], 0);
    assert_eq!(json["data"]["conflict_details"]["current_version"], 1);
    assert!(json["data"]["message"].as_str().unwrap().contains("stale"));
}

#[tokio::test]
async fn reacquire_by_holder_refreshes() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");
    post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;

    let (status, json) = post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["message"], "Lock refreshed");
    assert_eq!(json["data"]["lock"]["version"], 2);
}

#[tokio::test]
async fn requester_info_from_body_overrides_token_name() {
    let (app, _) = build_test_app();

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/acquire"),
        &token("u1", "user"),
        json!({ "requester_id": "u1", "requester_info": { "name": "Ada" } }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["lock"]["holder_info"]["name"], "Ada");
    assert_eq!(json["data"]["lock"]["holder_info"]["email"], "u1@example.com");
}

#[tokio::test]
async fn mismatched_requester_id_returns_403() {
    let (app, _) = build_test_app();

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/acquire"),
        &token("u1", "user"),
        json!({ "requester_id": "u2" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Test: release guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn release_by_non_holder_returns_403() {
    let (app, _) = build_test_app();
    post_json(&app, &format!("{A1}/lock/acquire"), &token("u1", "user"), json!({})).await;

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/release"),
        &token("u2", "user"),
        json!({ "expected_version": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["data"]["success"], false);
    assert_eq!(json["data"]["lock"]["holder_id"], "u1");
}

#[tokio::test]
async fn release_at_wrong_version_returns_409() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");
    post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/release"),
        &u1,
        json!({ "expected_version": 7 }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["data"]["conflict_details"]["current_version"], 1);
    assert_eq!(json["data"]["conflict_details"]["expected_version"], 7);
}

#[tokio::test]
async fn release_without_expected_version_is_rejected() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");
    post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;

    let (status, _) = post_json(&app, &format!("{A1}/lock/release"), &u1, json!({})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn release_of_free_resource_returns_403() {
    let (app, _) = build_test_app();

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/release"),
        &token("u1", "user"),
        json!({ "expected_version": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["data"].get("lock").is_none());
}

// ---------------------------------------------------------------------------
// Test: heartbeat and status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_keeps_version_and_rejects_non_holder() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");
    post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;

    let (status, json) = post_json(&app, &format!("{A1}/lock/heartbeat"), &u1, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["lock"]["version"], 1);

    let (status, _) = post_json(
        &app,
        &format!("{A1}/lock/heartbeat"),
        &token("u2", "user"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lock_status_reflects_current_holder() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");

    let (status, json) = get(&app, &format!("{A1}/lock"), &u1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["locked"], false);
    assert!(json["data"]["lock"].is_null());

    post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;

    let (_, json) = get(&app, &format!("{A1}/lock"), &u1).await;
    assert_eq!(json["data"]["locked"], true);
    assert_eq!(json["data"]["lock"]["holder_id"], "u1");
    assert!(json["data"]["remaining_seconds"].as_i64().unwrap() > 0);
}

// ---------------------------------------------------------------------------
// Test: admin operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn force_release_requires_admin() {
    let (app, _) = build_test_app();
    post_json(&app, &format!("{A1}/lock/acquire"), &token("u1", "user"), json!({})).await;

    let (status, _) = post_json(
        &app,
        &format!("{A1}/lock/force-release"),
        &token("u2", "user"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token("admin", "admin");
    let (status, json) =
        post_json(&app, &format!("{A1}/lock/force-release"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["message"].as_str().unwrap().contains("User u1"));

    let (status, _) =
        post_json(&app, &format!("{A1}/lock/force-release"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn takeover_transfers_lock_to_admin() {
    let (app, _) = build_test_app();
    post_json(&app, &format!("{A1}/lock/acquire"), &token("u1", "user"), json!({})).await;

    let (status, json) = post_json(
        &app,
        &format!("{A1}/lock/takeover"),
        &token("admin", "admin"),
        json!({ "admin_id": "admin" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["lock"]["holder_id"], "admin");
    assert_eq!(json["data"]["lock"]["version"], 2);
    assert_eq!(json["data"]["message"], "Lock taken over from User u1");
}

#[tokio::test]
async fn takeover_with_mismatched_admin_id_returns_403() {
    let (app, _) = build_test_app();

    let (status, _) = post_json(
        &app,
        &format!("{A1}/lock/takeover"),
        &token("admin", "admin"),
        json!({ "admin_id": "someone-else" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Test: cursor presence over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cursor_update_is_listed_and_rate_limited() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");

    let (status, json) = post_json(
        &app,
        &format!("{A1}/cursor"),
        &u1,
        json!({ "position": { "x": 10.0, "y": 20.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["cursor"]["user_id"], "u1");
    assert_eq!(json["data"]["version_stale"], false);

    let (status, json) = post_json(
        &app,
        &format!("{A1}/cursor"),
        &u1,
        json!({ "position": { "x": 11.0, "y": 21.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "RATE_LIMITED");

    let (status, json) = get(&app, &format!("{A1}/cursors"), &u1).await;
    assert_eq!(status, StatusCode::OK);
    let cursors = json["data"].as_array().unwrap();
    assert_eq!(cursors.len(), 1);
    assert_eq!(cursors[0]["position"]["x"], 10.0);
}

#[tokio::test]
async fn cursor_update_flags_stale_lock_version() {
    let (app, _) = build_test_app();
    post_json(&app, &format!("{A1}/lock/acquire"), &token("u1", "user"), json!({})).await;

    let (status, json) = post_json(
        &app,
        &format!("{A1}/cursor"),
        &token("u2", "user"),
        json!({ "position": { "x": 1.0, "y": 1.0 }, "expected_version": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["version_stale"], true);
    assert_eq!(json["data"]["current_version"], 1);
}

#[tokio::test]
async fn cursor_update_on_unlocked_resource_with_version_zero_is_fresh() {
    let (app, _) = build_test_app();

    let (status, json) = post_json(
        &app,
        &format!("{A1}/cursor"),
        &token("u1", "user"),
        json!({ "position": { "x": 1.0, "y": 1.0 }, "expected_version": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["version_stale"], false);
    assert_eq!(json["data"]["current_version"], 0);
}

#[tokio::test]
async fn cursor_update_after_release_flags_cached_version_stale() {
    let (app, _) = build_test_app();
    let u1 = token("u1", "user");
    post_json(&app, &format!("{A1}/lock/acquire"), &u1, json!({})).await;
    post_json(
        &app,
        &format!("{A1}/lock/release"),
        &u1,
        json!({ "expected_version": 1 }),
    )
    .await;

    let (status, json) = post_json(
        &app,
        &format!("{A1}/cursor"),
        &token("u2", "user"),
        json!({ "position": { "x": 1.0, "y": 1.0 }, "expected_version": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["version_stale"], true);
    assert_eq!(json["data"]["current_version"], 0);
}
