//! Resource lock model, lease arithmetic, and boundary validation.
//!
//! A [`ResourceLock`] is the single record the lock store keeps per resource.
//! The record outlives the lease: once released, expired, or force-released
//! it stays in the store flagged inactive so that the next lease continues the
//! version sequence from where the previous one stopped.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::types::{ResourceId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Lease constants
// ---------------------------------------------------------------------------

/// Default lease length in seconds (5 minutes).
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// Shortest lease the server accepts in configuration.
pub const MIN_LOCK_TTL_SECS: i64 = 1;

/// Longest lease the server accepts in configuration (4 hours).
pub const MAX_LOCK_TTL_SECS: i64 = 4 * 60 * 60;

/// Heartbeat interval clients are told to use (4 of every 5 minutes).
pub const RECOMMENDED_HEARTBEAT_SECS: i64 = 240;

/// How often the expiry sweep runs by default (in seconds).
pub const LOCK_SWEEP_INTERVAL_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Field limits
// ---------------------------------------------------------------------------

pub const MAX_RESOURCE_ID_LEN: usize = 128;
pub const MAX_HOLDER_NAME_LEN: usize = 100;
pub const MAX_HOLDER_EMAIL_LEN: usize = 255;

/// Display name used when the identity collaborator supplies neither a name
/// nor an email.
pub const UNKNOWN_HOLDER_NAME: &str = "Unknown user";

static RESOURCE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").expect("resource id pattern is valid")
});

// ---------------------------------------------------------------------------
// HolderInfo
// ---------------------------------------------------------------------------

/// Display information about a lock holder, as supplied by the identity
/// collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolderInfo {
    pub name: String,
    pub email: String,
}

impl HolderInfo {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Trim and truncate both fields to their storage limits.
    pub fn sanitized(self) -> Self {
        Self {
            name: truncate_chars(self.name.trim(), MAX_HOLDER_NAME_LEN),
            email: truncate_chars(self.email.trim(), MAX_HOLDER_EMAIL_LEN),
        }
    }

    /// The best human-readable label for this holder.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.email.is_empty() {
            &self.email
        } else {
            UNKNOWN_HOLDER_NAME
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceLock
// ---------------------------------------------------------------------------

/// The lock record for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Identity of this lease; stable across self-refresh and heartbeat.
    pub lock_id: Uuid,
    pub resource_id: ResourceId,
    pub holder_id: UserId,
    pub holder_info: HolderInfo,
    pub version: i64,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    /// `false` once the lease has been released, force-released, or expired.
    pub is_active: bool,
    pub released_at: Option<Timestamp>,
}

impl ResourceLock {
    /// Start a new lease for `holder_id` lasting `ttl` from `now`.
    pub fn new(
        resource_id: impl Into<ResourceId>,
        holder_id: impl Into<UserId>,
        holder_info: HolderInfo,
        version: i64,
        now: Timestamp,
        ttl: Duration,
    ) -> Self {
        Self {
            lock_id: Uuid::now_v7(),
            resource_id: resource_id.into(),
            holder_id: holder_id.into(),
            holder_info,
            version,
            created_at: now,
            expires_at: now + ttl,
            is_active: true,
            released_at: None,
        }
    }

    /// Whether the lease is active and has not reached `expires_at`.
    pub fn is_held_at(&self, now: Timestamp) -> bool {
        self.is_active && self.expires_at > now
    }

    /// Whether the record still claims to be active but its lease has
    /// elapsed. Such a record is awaiting the expiry transition.
    pub fn is_elapsed_at(&self, now: Timestamp) -> bool {
        self.is_active && self.expires_at <= now
    }

    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.holder_id == user_id
    }

    /// Whole seconds left on the lease, never negative.
    pub fn remaining_seconds(&self, now: Timestamp) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Whole seconds between lease creation and `until`.
    pub fn held_seconds(&self, until: Timestamp) -> i64 {
        (until - self.created_at).num_seconds().max(0)
    }

    /// The same lease with its expiry pushed to `now + ttl`.
    pub fn extended(&self, now: Timestamp, ttl: Duration) -> Self {
        Self {
            expires_at: now + ttl,
            ..self.clone()
        }
    }

    /// The same lease extended and moved to the next version.
    pub fn refreshed(&self, now: Timestamp, ttl: Duration) -> Self {
        Self {
            version: self.version + 1,
            ..self.extended(now, ttl)
        }
    }

    /// The inactive record left behind when the lease ends at `now`.
    ///
    /// The version is carried over unchanged so the next lease continues
    /// the sequence.
    pub fn ended(&self, now: Timestamp) -> Self {
        Self {
            is_active: false,
            released_at: Some(now),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Truncate `value` to at most `max` characters (not bytes).
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Validate a resource id. Returns `Ok(())` or an error message.
pub fn validate_resource_id(resource_id: &str) -> Result<(), String> {
    if resource_id.is_empty() {
        return Err("resource_id must not be empty".to_string());
    }
    if resource_id.len() > MAX_RESOURCE_ID_LEN {
        return Err(format!(
            "resource_id must be at most {MAX_RESOURCE_ID_LEN} characters, got {}",
            resource_id.len()
        ));
    }
    if !RESOURCE_ID_RE.is_match(resource_id) {
        return Err(format!(
            "resource_id '{resource_id}' contains invalid characters \
             (allowed: letters, digits, '_', '.', ':', '-')"
        ));
    }
    Ok(())
}

/// Validate a configured lease length in seconds.
pub fn validate_lock_ttl(seconds: i64) -> Result<(), String> {
    if seconds < MIN_LOCK_TTL_SECS {
        return Err(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_SECS} second(s), got {seconds}"
        ));
    }
    if seconds > MAX_LOCK_TTL_SECS {
        return Err(format!(
            "Lock TTL must be at most {MAX_LOCK_TTL_SECS} seconds, got {seconds}"
        ));
    }
    Ok(())
}

/// Validate holder display information supplied in a request body.
///
/// An empty email is allowed (the identity collaborator may not expose
/// one); a non-empty email must be well formed.
pub fn validate_holder_info(info: &HolderInfo) -> Result<(), String> {
    if info.name.chars().count() > MAX_HOLDER_NAME_LEN {
        return Err(format!(
            "name must be at most {MAX_HOLDER_NAME_LEN} characters"
        ));
    }
    if !info.email.is_empty() && !info.email.clone().validate_email() {
        return Err(format!("'{}' is not a valid email address", info.email));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample_lock(now: Timestamp) -> ResourceLock {
        ResourceLock::new(
            "A1",
            "u1",
            HolderInfo::new("Ada", "ada@example.com"),
            1,
            now,
            Duration::seconds(DEFAULT_LOCK_TTL_SECS),
        )
    }

    #[test]
    fn new_lock_is_held_until_expiry() {
        let now = Utc::now();
        let lock = sample_lock(now);

        assert!(lock.is_held_at(now));
        assert!(lock.is_held_at(now + Duration::seconds(299)));
        assert!(!lock.is_held_at(now + Duration::seconds(300)));
        assert!(lock.is_elapsed_at(now + Duration::seconds(300)));
    }

    #[test]
    fn ended_lock_keeps_version_and_is_not_held() {
        let now = Utc::now();
        let ended = sample_lock(now).ended(now);

        assert!(!ended.is_active);
        assert_eq!(ended.version, 1);
        assert_eq!(ended.released_at, Some(now));
        assert!(!ended.is_held_at(now));
        assert!(!ended.is_elapsed_at(now + Duration::hours(1)));
    }

    #[test]
    fn refreshed_bumps_version_and_keeps_lock_id() {
        let now = Utc::now();
        let lock = sample_lock(now);
        let later = now + Duration::seconds(60);
        let refreshed = lock.refreshed(later, Duration::seconds(300));

        assert_eq!(refreshed.lock_id, lock.lock_id);
        assert_eq!(refreshed.version, 2);
        assert_eq!(refreshed.expires_at, later + Duration::seconds(300));
    }

    #[test]
    fn extended_keeps_version() {
        let now = Utc::now();
        let lock = sample_lock(now);
        let extended = lock.extended(now + Duration::seconds(10), Duration::seconds(300));

        assert_eq!(extended.version, lock.version);
        assert!(extended.expires_at > lock.expires_at);
    }

    #[test]
    fn remaining_seconds_never_negative() {
        let now = Utc::now();
        let lock = sample_lock(now);

        assert_eq!(lock.remaining_seconds(now), 300);
        assert_eq!(lock.remaining_seconds(now + Duration::hours(1)), 0);
    }

    #[test]
    fn display_name_falls_back_to_email_then_placeholder() {
        assert_eq!(HolderInfo::new("Ada", "a@x.io").display_name(), "Ada");
        assert_eq!(HolderInfo::new("", "a@x.io").display_name(), "a@x.io");
        assert_eq!(HolderInfo::default().display_name(), UNKNOWN_HOLDER_NAME);
    }

    #[test]
    fn sanitized_truncates_long_fields() {
        let info = HolderInfo::new("n".repeat(150), "  e@x.io  ").sanitized();
        assert_eq!(info.name.chars().count(), MAX_HOLDER_NAME_LEN);
        assert_eq!(info.email, "e@x.io");
    }

    #[test]
    fn test_valid_resource_ids() {
        assert!(validate_resource_id("A1").is_ok());
        assert!(validate_resource_id("appointment:2026-10-19.42").is_ok());
        assert!(validate_resource_id("a_b-c").is_ok());
    }

    #[test]
    fn test_invalid_resource_ids() {
        assert!(validate_resource_id("").is_err());
        assert!(validate_resource_id("-leading").is_err());
        assert!(validate_resource_id("has space").is_err());
        assert!(validate_resource_id("slash/inside").is_err());
        assert!(validate_resource_id(&"a".repeat(MAX_RESOURCE_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_lock_ttl_bounds() {
        assert!(validate_lock_ttl(DEFAULT_LOCK_TTL_SECS).is_ok());
        assert!(validate_lock_ttl(0).unwrap_err().contains("at least"));
        assert!(validate_lock_ttl(MAX_LOCK_TTL_SECS + 1)
            .unwrap_err()
            .contains("at most"));
    }

    #[test]
    fn test_holder_info_validation() {
        assert!(validate_holder_info(&HolderInfo::new("Ada", "ada@example.com")).is_ok());
        assert!(validate_holder_info(&HolderInfo::new("Ada", "")).is_ok());
        assert!(validate_holder_info(&HolderInfo::new("Ada", "not-an-email")).is_err());
        assert!(validate_holder_info(&HolderInfo::new("x".repeat(101), "")).is_err());
    }

    #[test]
    fn heartbeat_interval_is_inside_ttl() {
        assert!(RECOMMENDED_HEARTBEAT_SECS < DEFAULT_LOCK_TTL_SECS);
    }
}
