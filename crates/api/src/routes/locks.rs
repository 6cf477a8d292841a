//! Route definitions for locks and cursor presence.
//!
//! All endpoints require authentication via the `AuthUser` extractor;
//! force-release and takeover additionally require the admin role.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{locks, presence};
use crate::state::AppState;

/// Lock and presence routes.
///
/// ```text
/// GET  /resources/{id}/lock                  -> get_lock_status
/// POST /resources/{id}/lock/acquire          -> acquire_lock
/// POST /resources/{id}/lock/release          -> release_lock
/// POST /resources/{id}/lock/heartbeat        -> heartbeat_lock
/// POST /resources/{id}/lock/force-release    -> force_release_lock
/// POST /resources/{id}/lock/takeover         -> takeover_lock
/// POST /resources/{id}/cursor                -> update_cursor
/// GET  /resources/{id}/cursors               -> list_cursors
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resources/{id}/lock", get(locks::get_lock_status))
        .route("/resources/{id}/lock/acquire", post(locks::acquire_lock))
        .route("/resources/{id}/lock/release", post(locks::release_lock))
        .route("/resources/{id}/lock/heartbeat", post(locks::heartbeat_lock))
        .route(
            "/resources/{id}/lock/force-release",
            post(locks::force_release_lock),
        )
        .route("/resources/{id}/lock/takeover", post(locks::takeover_lock))
        .route("/resources/{id}/cursor", post(presence::update_cursor))
        .route("/resources/{id}/cursors", get(presence::list_cursors))
}
