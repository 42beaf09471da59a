//! Shift records (verification statuses)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use qv_common::models::VerificationStatus;

use crate::api::identity::CurrentUser;
use crate::services::verification::{self, VerificationDetail};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

/// POST /api/verifications
///
/// Returns the caller's record for the running shift, creating it (201)
/// on first use.
pub async fn open_current(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<(StatusCode, Json<VerificationStatus>)> {
    let (record, created) =
        verification::open_current(&state.db, &user.0, state.clock.now()).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(record)))
}

/// GET /api/verifications/:id
pub async fn get_verification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> ApiResult<Json<VerificationDetail>> {
    Ok(Json(verification::detail(&state.db, id).await?))
}

/// GET /api/verifications?date=YYYY-MM-DD
pub async fn list_verifications(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<VerificationStatus>>> {
    let date = query.date.unwrap_or_else(|| state.clock.now().date());
    Ok(Json(verification::list_by_date(&state.db, date).await?))
}

pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/verifications",
            post(open_current).get(list_verifications),
        )
        .route("/api/verifications/:id", get(get_verification))
}
