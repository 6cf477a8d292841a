//! Pagination helpers shared by the history queries.

use serde::Serialize;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_uses_default_when_none() {
        assert_eq!(clamp_limit(None, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 50);
    }

    #[test]
    fn clamp_limit_respects_max() {
        assert_eq!(clamp_limit(Some(10_000), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 500);
    }

    #[test]
    fn clamp_limit_floors_at_one() {
        assert_eq!(clamp_limit(Some(0), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 1);
        assert_eq!(clamp_limit(Some(-3), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 1);
    }

    #[test]
    fn clamp_offset_floors_at_zero() {
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(-5)), 0);
        assert_eq!(clamp_offset(Some(20)), 20);
    }
}
