#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use coedit_api::auth::jwt::{generate_access_token, JwtConfig};
use coedit_api::config::{LockSettings, ServerConfig};
use coedit_api::router::build_app_router;
use coedit_api::state::AppState;

const TEST_SECRET: &str = "test-secret-for-integration-tests";

/// Build a test `ServerConfig` with safe defaults and in-memory stores.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: None,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        locks: LockSettings::default(),
    }
}

/// Build the full application router over in-memory stores.
///
/// Uses the same `build_app_router` as `main.rs`, so the middleware stack
/// is the production one. The state is returned alongside for direct
/// access to the lock manager and WebSocket manager.
pub fn build_test_app() -> (Router, AppState) {
    let config = test_config();
    let state = AppState::in_memory(config.clone());
    (build_app_router(state.clone(), &config), state)
}

/// Access token for `user_id` with the given role. The display name is
/// `"User <id>"` and the email `"<id>@example.com"`.
pub fn token(user_id: &str, role: &str) -> String {
    generate_access_token(
        user_id,
        &format!("User {user_id}"),
        &format!("{user_id}@example.com"),
        role,
        &test_config().jwt,
    )
    .unwrap()
}

/// Send a request and return the status plus the parsed JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
