//! User administration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use qv_common::models::{Role, User};

use crate::api::identity::CurrentUser;
use crate::db::users;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() || username.chars().any(|c| c.is_whitespace()) {
        return Err(ApiError::BadRequest(
            "Username must be non-empty and contain no spaces".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/users (admin)
pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    user.require_admin()?;
    let username = request.username.trim();
    validate_username(username)?;
    let display_name = match request.display_name.trim() {
        "" => username,
        name => name,
    };

    let mut conn = state.db.acquire().await.map_err(qv_common::Error::from)?;
    let created = users::insert_user(
        &mut conn,
        username,
        display_name,
        request.role,
        state.clock.now(),
    )
    .await?;

    info!(username = %created.username, role = %created.role, by = %user.0.username, "User created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<User>>> {
    let mut conn = state.db.acquire().await.map_err(qv_common::Error::from)?;
    Ok(Json(users::list_users(&mut conn).await?))
}

/// PUT /api/users/:id/active (admin)
pub async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<Json<User>> {
    user.require_admin()?;
    if id == user.0.id && !request.active {
        return Err(ApiError::BadRequest(
            "Administrators cannot deactivate themselves".to_string(),
        ));
    }

    let mut conn = state.db.acquire().await.map_err(qv_common::Error::from)?;
    if !users::set_active(&mut conn, id, request.active).await? {
        return Err(ApiError::NotFound(format!("user {}", id)));
    }
    let updated = users::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", id)))?;

    info!(username = %updated.username, active = updated.active, "User activation changed");
    Ok(Json(updated))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id/active", put(set_active))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("op1").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("op 1").is_err());
    }
}
