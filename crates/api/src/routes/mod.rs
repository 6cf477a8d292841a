pub mod health;
pub mod history;
pub mod locks;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                        WebSocket (?token=)
///
/// /resources/{id}/lock                       status (GET)
/// /resources/{id}/lock/acquire               acquire or refresh (POST)
/// /resources/{id}/lock/release               release (POST)
/// /resources/{id}/lock/heartbeat             extend lease (POST)
/// /resources/{id}/lock/force-release         force-release (POST, admin)
/// /resources/{id}/lock/takeover              admin takeover (POST, admin)
/// /resources/{id}/cursor                     cursor update (POST)
/// /resources/{id}/cursors                    live cursors (GET)
///
/// /resources/{id}/history                    resource history (GET)
/// /resources/{id}/history/stats              statistics (GET)
/// /users/{user_id}/lock-history              user history (GET)
/// /lock-activity                             recent activity (GET)
/// /admin/lock-history                        retention cleanup (DELETE, admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(locks::router())
        .merge(history::router())
}
