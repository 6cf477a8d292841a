//! Authentication primitives.
//!
//! - [`jwt`] -- JWT access-token generation and validation.

pub mod jwt;

/// Role name that grants administrative lock operations.
pub const ROLE_ADMIN: &str = "admin";
