//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.

pub mod auth;
pub mod rbac;
