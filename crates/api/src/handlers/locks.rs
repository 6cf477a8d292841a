//! Handlers for resource locks.
//!
//! Lock conflicts are answered with a `LockActionResponse` carrying
//! `success: false` and enough detail for the client to resync, not with
//! an `AppError`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use coedit_core::lock::{validate_holder_info, HolderInfo, ResourceLock};
use coedit_locks::{AcquireOutcome, ForceReleaseOutcome, HeartbeatOutcome, ReleaseOutcome};
use serde::{Deserialize, Serialize};

use super::validated;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::{DataResponse, LockActionResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AcquireLockRequest {
    pub requester_id: Option<String>,
    pub requester_info: Option<HolderInfo>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseLockRequest {
    #[serde(default)]
    pub requester_id: Option<String>,
    pub expected_version: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HeartbeatRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdminLockRequest {
    pub admin_id: Option<String>,
    pub admin_info: Option<HolderInfo>,
}

#[derive(Debug, Serialize)]
pub struct LockStatusResponse {
    pub resource_id: String,
    pub locked: bool,
    pub lock: Option<ResourceLock>,
    pub remaining_seconds: Option<i64>,
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/resources/{id}/lock
///
/// Current lock of a resource, if any.
pub async fn get_lock_status(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validated(&resource_id)?;
    let status = state.lock_manager.status(&resource_id).await?;

    Ok(Json(DataResponse {
        data: LockStatusResponse {
            resource_id,
            locked: status.lock.is_some(),
            lock: status.lock,
            remaining_seconds: status.remaining_seconds,
        },
    }))
}

/// POST /api/v1/resources/{id}/lock/acquire
///
/// Acquire the lock, or refresh it when the caller already holds it.
/// Returns 409 with conflict details when someone else holds it.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(input): Json<AcquireLockRequest>,
) -> AppResult<Response> {
    validated(&resource_id)?;
    auth.ensure_identity("requester_id", input.requester_id.as_deref())?;

    let mut requester = auth.requester();
    if let Some(info) = input.requester_info {
        requester.info = checked_info(info, &requester.info)?;
    }

    let outcome = state
        .lock_manager
        .acquire(&resource_id, &requester, input.expected_version)
        .await?;

    let now = Utc::now();
    Ok(match outcome {
        AcquireOutcome::Locked { lock, refreshed } => {
            let message = if refreshed {
                "Lock refreshed"
            } else {
                "Lock acquired"
            };
            respond(StatusCode::OK, LockActionResponse::ok(Some(lock), message))
        }
        AcquireOutcome::HolderConflict { current } => respond(
            StatusCode::CONFLICT,
            LockActionResponse::conflict(
                held_by(&current, now),
                &current,
                input.expected_version,
                current.remaining_seconds(now),
            ),
        ),
        AcquireOutcome::VersionConflict {
            current,
            expected_version,
        } => respond(
            StatusCode::CONFLICT,
            LockActionResponse::conflict(
                format!(
                    "Version {expected_version} is stale, current version is {}. {}",
                    current.version,
                    held_by(&current, now)
                ),
                &current,
                Some(expected_version),
                current.remaining_seconds(now),
            ),
        ),
    })
}

/// POST /api/v1/resources/{id}/lock/release
///
/// Release a held lock. Only the holder can release, and only at the
/// current version.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(input): Json<ReleaseLockRequest>,
) -> AppResult<Response> {
    validated(&resource_id)?;
    auth.ensure_identity("requester_id", input.requester_id.as_deref())?;

    let outcome = state
        .lock_manager
        .release(&resource_id, &auth.user_id, input.expected_version)
        .await?;

    let now = Utc::now();
    Ok(match outcome {
        ReleaseOutcome::Released { .. } => {
            respond(StatusCode::OK, LockActionResponse::ok(None, "Lock released"))
        }
        ReleaseOutcome::NotHolder { current } => respond(
            StatusCode::FORBIDDEN,
            not_holder(current.as_ref(), now, "release"),
        ),
        ReleaseOutcome::VersionMismatch {
            current,
            expected_version,
        } => respond(
            StatusCode::CONFLICT,
            LockActionResponse::conflict(
                format!(
                    "Version {expected_version} is stale, current version is {}",
                    current.version
                ),
                &current,
                Some(expected_version),
                current.remaining_seconds(now),
            ),
        ),
    })
}

/// POST /api/v1/resources/{id}/lock/heartbeat
///
/// Extend the caller's lease. The version is unchanged.
pub async fn heartbeat_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(input): Json<HeartbeatRequest>,
) -> AppResult<Response> {
    validated(&resource_id)?;
    auth.ensure_identity("user_id", input.user_id.as_deref())?;

    let outcome = state
        .lock_manager
        .heartbeat(&resource_id, &auth.user_id)
        .await?;

    Ok(match outcome {
        HeartbeatOutcome::Refreshed { lock } => respond(
            StatusCode::OK,
            LockActionResponse::ok(Some(lock), "Lock lease extended"),
        ),
        HeartbeatOutcome::NotHolder { current } => respond(
            StatusCode::FORBIDDEN,
            not_holder(current.as_ref(), Utc::now(), "extend"),
        ),
    })
}

/// POST /api/v1/resources/{id}/lock/force-release
///
/// Admin only. Clear the lock regardless of who holds it.
pub async fn force_release_lock(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(input): Json<AdminLockRequest>,
) -> AppResult<Response> {
    validated(&resource_id)?;
    admin.ensure_identity("admin_id", input.admin_id.as_deref())?;

    let outcome = state
        .lock_manager
        .force_release(&resource_id, &admin.user_id)
        .await?;

    Ok(match outcome {
        ForceReleaseOutcome::Released { previous } => respond(
            StatusCode::OK,
            LockActionResponse::ok(
                None,
                format!(
                    "Lock held by {} was force-released",
                    previous.holder_info.display_name()
                ),
            ),
        ),
        ForceReleaseOutcome::NotFound => respond(
            StatusCode::NOT_FOUND,
            LockActionResponse::failed("Resource is not locked"),
        ),
    })
}

/// POST /api/v1/resources/{id}/lock/takeover
///
/// Admin only. Force-release any current lock and acquire it for the
/// caller in one step.
pub async fn takeover_lock(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(input): Json<AdminLockRequest>,
) -> AppResult<Response> {
    validated(&resource_id)?;
    admin.ensure_identity("admin_id", input.admin_id.as_deref())?;

    let mut requester = admin.requester();
    if let Some(info) = input.admin_info {
        requester.info = checked_info(info, &requester.info)?;
    }

    let outcome = state
        .lock_manager
        .admin_takeover(&resource_id, &requester)
        .await?;

    let message = match &outcome.previous {
        Some(previous) => format!(
            "Lock taken over from {}",
            previous.holder_info.display_name()
        ),
        None => "Lock acquired".to_string(),
    };
    Ok(respond(
        StatusCode::OK,
        LockActionResponse::ok(Some(outcome.lock), message),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn respond(status: StatusCode, body: LockActionResponse) -> Response {
    (status, Json(DataResponse { data: body })).into_response()
}

fn held_by(lock: &ResourceLock, now: chrono::DateTime<Utc>) -> String {
    format!(
        "Resource is locked by {} ({}s remaining)",
        lock.holder_info.display_name(),
        lock.remaining_seconds(now)
    )
}

fn not_holder(
    current: Option<&ResourceLock>,
    now: chrono::DateTime<Utc>,
    verb: &str,
) -> LockActionResponse {
    match current {
        Some(lock) => LockActionResponse {
            lock: Some(lock.clone()),
            ..LockActionResponse::failed(format!(
                "You do not hold this lock and cannot {verb} it. {}",
                held_by(lock, now)
            ))
        },
        None => LockActionResponse::failed(format!(
            "Resource is not locked, nothing to {verb}"
        )),
    }
}

/// Body-supplied display info, sanitized and validated. Blank fields fall
/// back to the token's values.
fn checked_info(info: HolderInfo, fallback: &HolderInfo) -> Result<HolderInfo, AppError> {
    let mut info = info.sanitized();
    if info.name.is_empty() {
        info.name = fallback.name.clone();
    }
    if info.email.is_empty() {
        info.email = fallback.email.clone();
    }
    validate_holder_info(&info).map_err(AppError::BadRequest)?;
    Ok(info)
}
