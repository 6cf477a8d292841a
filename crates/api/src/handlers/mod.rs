//! HTTP request handlers, grouped by concern.

pub mod history;
pub mod locks;
pub mod presence;

use coedit_core::lock::validate_resource_id;

use crate::error::AppError;

/// Reject malformed resource ids before they reach the lock manager.
pub(crate) fn validated(resource_id: &str) -> Result<(), AppError> {
    validate_resource_id(resource_id).map_err(AppError::BadRequest)
}
