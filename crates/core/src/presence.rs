//! Cursor presence constants, types, and input sanitization.
//!
//! Cursor state is ephemeral: it is never persisted and lives only in the
//! tracker of the process that received the update.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lock::{truncate_chars, MAX_HOLDER_EMAIL_LEN, MAX_HOLDER_NAME_LEN};
use crate::types::{ResourceId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Largest accepted coordinate on either axis.
pub const MAX_CURSOR_COORDINATE: f64 = 10_000.0;

/// Minimum interval between accepted updates from one connection.
pub const CURSOR_MIN_INTERVAL_MS: u64 = 50;

/// Cursors idle longer than this are purged by the sweep.
pub const CURSOR_IDLE_TIMEOUT_SECS: u64 = 10;

/// How often the idle sweep runs.
pub const CURSOR_SWEEP_INTERVAL_SECS: u64 = 5;

/// Color used when the supplied one is missing or malformed.
pub const DEFAULT_CURSOR_COLOR: &str = "#3B82F6";

/// Colors handed out to users who do not pick one.
pub const CURSOR_PALETTE: &[&str] = &[
    "#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
];

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("color pattern is valid"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into the viewport; NaN and infinities become `0`.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_coordinate(self.x),
            y: clamp_coordinate(self.y),
        }
    }
}

/// The live cursor of one user on one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub resource_id: ResourceId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub color: String,
    pub position: CursorPosition,
    pub last_seen: Timestamp,
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

fn clamp_coordinate(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_CURSOR_COORDINATE)
    } else {
        0.0
    }
}

pub fn is_valid_color(color: &str) -> bool {
    COLOR_RE.is_match(color)
}

/// Return the requested color if it is a `#RRGGBB` hex string, otherwise
/// the user's palette color.
pub fn sanitize_color(color: Option<&str>, user_id: &str) -> String {
    match color.map(str::trim) {
        Some(c) if is_valid_color(c) => c.to_uppercase(),
        _ => color_for_user(user_id).to_string(),
    }
}

/// Deterministic palette color for a user id.
pub fn color_for_user(user_id: &str) -> &'static str {
    if user_id.is_empty() {
        return DEFAULT_CURSOR_COLOR;
    }
    let hash = user_id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    CURSOR_PALETTE[hash as usize % CURSOR_PALETTE.len()]
}

pub fn sanitize_user_name(name: &str) -> String {
    truncate_chars(name.trim(), MAX_HOLDER_NAME_LEN)
}

pub fn sanitize_user_email(email: &str) -> String {
    truncate_chars(email.trim(), MAX_HOLDER_EMAIL_LEN)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
