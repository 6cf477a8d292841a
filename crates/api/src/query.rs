//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped by the history recorder.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?limit=` for unpaged feeds.
#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// `?older_than_days=` for retention cleanup. Defaults to the configured
/// retention.
#[derive(Debug, Deserialize)]
pub struct RetentionParams {
    pub older_than_days: Option<i64>,
}
