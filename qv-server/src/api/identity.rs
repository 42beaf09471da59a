//! Caller identity
//!
//! The shop floor runs behind the plant network; callers name themselves
//! with the `X-QV-User` header carrying their username. Unknown or
//! deactivated users get 401.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::debug;

use qv_common::models::{Role, User};

use crate::db::users;
use crate::{ApiError, AppState};

/// Header carrying the caller's username
pub const USER_HEADER: &str = "x-qv-user";

/// Authenticated caller, extracted from the identity header
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Fail with 403 unless the caller is an admin
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} is not an administrator",
                self.0.username
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", USER_HEADER)))?;

        let mut conn = state.db.acquire().await.map_err(qv_common::Error::from)?;
        let user = users::find_by_username(&mut conn, username)
            .await?
            .filter(|user| user.active)
            .ok_or_else(|| ApiError::Unauthorized(format!("Unknown user '{}'", username)))?;

        debug!(user = %user.username, role = %user.role, "Identified caller");
        Ok(CurrentUser(user))
    }
}
