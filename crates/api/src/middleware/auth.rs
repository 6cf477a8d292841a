//! JWT-based authentication extractor for Axum handlers.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use coedit_core::error::CoreError;
use coedit_core::lock::HolderInfo;
use coedit_core::types::UserId;
use coedit_locks::Requester;
use serde::Deserialize;

use crate::auth::jwt::validate_token;
use crate::auth::ROLE_ADMIN;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT.
///
/// The token is read from the `Authorization: Bearer` header, or from a
/// `token` query parameter for WebSocket upgrades (browsers cannot set
/// headers on those).
///
/// ```ignore
/// async fn my_handler(auth: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %auth.user_id, role = %auth.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's identifier (from `claims.sub`).
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    /// The user's role name (e.g. `"admin"`, `"user"`).
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Display info as it should appear on a lock held by this user.
    pub fn holder_info(&self) -> HolderInfo {
        HolderInfo::new(self.name.clone(), self.email.clone()).sanitized()
    }

    pub fn requester(&self) -> Requester {
        Requester::new(self.user_id.clone(), self.holder_info())
    }

    /// Reject a request whose body names a different identity than the
    /// token. An absent field is accepted.
    pub fn ensure_identity(&self, field: &str, claimed: Option<&str>) -> Result<(), AppError> {
        match claimed {
            Some(claimed) if claimed != self.user_id => Err(AppError::Core(CoreError::Forbidden(
                format!("{field} does not match the authenticated user"),
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            Some(header) => header
                .strip_prefix("Bearer ")
                .map(str::to_string)
                .ok_or_else(|| {
                    AppError::Core(CoreError::Unauthorized(
                        "Invalid Authorization format. Expected: Bearer <token>".into(),
                    ))
                })?,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.token)
                .ok_or_else(|| {
                    AppError::Core(CoreError::Unauthorized(
                        "Missing Authorization header".into(),
                    ))
                })?,
        };

        let claims = validate_token(&token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
        })
    }
}
