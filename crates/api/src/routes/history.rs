//! Route definitions for lock history.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::history;
use crate::state::AppState;

/// History routes.
///
/// ```text
/// GET    /resources/{id}/history             -> resource_history
/// GET    /resources/{id}/history/stats       -> resource_statistics
/// GET    /users/{user_id}/lock-history       -> user_history
/// GET    /lock-activity                      -> recent_activity
/// DELETE /admin/lock-history                 -> cleanup_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resources/{id}/history", get(history::resource_history))
        .route(
            "/resources/{id}/history/stats",
            get(history::resource_statistics),
        )
        .route("/users/{user_id}/lock-history", get(history::user_history))
        .route("/lock-activity", get(history::recent_activity))
        .route("/admin/lock-history", delete(history::cleanup_history))
}
