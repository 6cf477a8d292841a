//! Handlers for lock history, statistics, and retention.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use coedit_core::error::CoreError;
use serde::Serialize;

use super::validated;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::query::{LimitParams, PaginationParams, RetentionParams};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: u64,
    pub older_than_days: i64,
}

/// GET /api/v1/resources/{id}/history?limit=&offset=
///
/// Lifecycle events of a resource, newest first.
pub async fn resource_history(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    validated(&resource_id)?;
    let page = state
        .history
        .history(&resource_id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/resources/{id}/history/stats
pub async fn resource_statistics(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validated(&resource_id)?;
    let stats = state.history.statistics(&resource_id).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/users/{user_id}/lock-history?limit=&offset=
///
/// Events a user took part in, as holder or as releaser. Users may read
/// their own history; admins may read anyone's.
pub async fn user_history(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    if user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only admins may read another user's lock history".into(),
        )));
    }
    let page = state
        .history
        .user_history(&user_id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/lock-activity?limit=
///
/// Most recent events across all resources.
pub async fn recent_activity(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let events = state.history.recent_activity(params.limit).await?;
    Ok(Json(DataResponse { data: events }))
}

/// DELETE /api/v1/admin/lock-history?older_than_days=
///
/// Admin only. Delete events older than the given age, defaulting to the
/// configured retention.
pub async fn cleanup_history(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<RetentionParams>,
) -> AppResult<impl IntoResponse> {
    let days = params
        .older_than_days
        .unwrap_or(state.config.locks.history_retention_days);
    if days < 1 {
        return Err(AppError::BadRequest(
            "older_than_days must be at least 1".into(),
        ));
    }

    let cutoff = Utc::now() - chrono::Duration::days(days);
    let deleted = state.history.cleanup_older_than(cutoff).await?;
    tracing::info!(admin_id = %admin.user_id, days, deleted, "Lock history cleaned up");

    Ok(Json(DataResponse {
        data: CleanupResponse {
            deleted,
            older_than_days: days,
        },
    }))
}
