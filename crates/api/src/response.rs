//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use coedit_core::lock::ResourceLock;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Result of a lock operation, successful or not.
#[derive(Debug, Serialize)]
pub struct LockActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<ResourceLock>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_details: Option<ConflictDetails>,
}

/// What the caller needs to resync after a lock conflict.
#[derive(Debug, Serialize)]
pub struct ConflictDetails {
    pub current_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
    pub conflicting_holder: ConflictingHolder,
    pub remaining_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct ConflictingHolder {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl LockActionResponse {
    pub fn ok(lock: Option<ResourceLock>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            lock,
            message: message.into(),
            conflict_details: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            lock: None,
            message: message.into(),
            conflict_details: None,
        }
    }

    pub fn conflict(
        message: impl Into<String>,
        current: &ResourceLock,
        expected_version: Option<i64>,
        remaining_seconds: i64,
    ) -> Self {
        Self {
            success: false,
            lock: Some(current.clone()),
            message: message.into(),
            conflict_details: Some(ConflictDetails {
                current_version: current.version,
                expected_version,
                conflicting_holder: ConflictingHolder {
                    user_id: current.holder_id.clone(),
                    name: current.holder_info.display_name().to_string(),
                    email: current.holder_info.email.clone(),
                },
                remaining_seconds,
            }),
        }
    }
}
