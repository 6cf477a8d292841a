//! Handlers for cursor presence over HTTP.
//!
//! WebSocket clients send `cursor.move` instead; this is the fallback for
//! clients without a duplex channel.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use coedit_core::presence::{CursorPosition, CursorState};
use coedit_locks::{CursorUpdate, PositionOutcome};
use serde::{Deserialize, Serialize};

use super::validated;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CursorRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub position: CursorPosition,
    /// Lock version the client has cached for this resource.
    #[serde(default)]
    pub expected_version: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CursorResponse {
    pub cursor: CursorState,
    /// True when `expected_version` no longer matches the lock.
    pub version_stale: bool,
    /// Present when the caller sent `expected_version`; `0` when unlocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<i64>,
}

/// POST /api/v1/resources/{id}/cursor
///
/// Record the caller's cursor position and broadcast it to the room.
/// Returns 429 when updates arrive faster than the configured interval.
pub async fn update_cursor(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(input): Json<CursorRequest>,
) -> AppResult<impl IntoResponse> {
    validated(&resource_id)?;
    auth.ensure_identity("user_id", input.user_id.as_deref())?;

    let conn_key = format!("http:{}", auth.user_id);
    let update = CursorUpdate {
        resource_id: resource_id.clone(),
        user_id: auth.user_id.clone(),
        user_name: auth.name.clone(),
        user_email: auth.email.clone(),
        color: input.color,
        position: input.position,
    };

    let cursor = match state.presence.update_position(&conn_key, update).await {
        PositionOutcome::Accepted(cursor) => cursor,
        PositionOutcome::RateLimited { retry_after_ms } => {
            return Err(AppError::RateLimited { retry_after_ms });
        }
    };

    let (version_stale, current_version) = match input.expected_version {
        Some(expected) => {
            let status = state.lock_manager.status(&resource_id).await?;
            (status.is_stale(expected), Some(status.current_version()))
        }
        None => (false, None),
    };

    Ok(Json(DataResponse {
        data: CursorResponse {
            cursor,
            version_stale,
            current_version,
        },
    }))
}

/// GET /api/v1/resources/{id}/cursors
///
/// Live cursors on a resource.
pub async fn list_cursors(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validated(&resource_id)?;
    let cursors = state.presence.list(&resource_id).await;
    Ok(Json(DataResponse { data: cursors }))
}
