//! Subgroup edits and verification

use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::api::identity::CurrentUser;
use crate::api::RejectRequest;
use crate::services::subgroup::{self, SubgroupReadings, SubgroupResponse, VerifyAction};
use crate::{ApiResult, AppState};

async fn verify(
    state: &AppState,
    id: Uuid,
    user: &CurrentUser,
    action: VerifyAction,
    reason: Option<&str>,
) -> ApiResult<Json<SubgroupResponse>> {
    let response = subgroup::verify(
        &state.db,
        id,
        &user.0,
        action,
        reason,
        &state.tolerances,
        state.clock.now(),
    )
    .await?;
    Ok(Json(response))
}

/// PUT /api/subgroups/:id
pub async fn edit_subgroup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(request): Json<SubgroupReadings>,
) -> ApiResult<Json<SubgroupResponse>> {
    let response = subgroup::edit(
        &state.db,
        id,
        &user.0,
        request.readings,
        &state.tolerances,
        state.clock.now(),
    )
    .await?;
    Ok(Json(response))
}

pub async fn supervisor_verify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<SubgroupResponse>> {
    verify(&state, id, &user, VerifyAction::Supervisor, None).await
}

pub async fn quality_verify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<SubgroupResponse>> {
    verify(&state, id, &user, VerifyAction::Quality, None).await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(request): Json<RejectRequest>,
) -> ApiResult<Json<SubgroupResponse>> {
    verify(&state, id, &user, VerifyAction::Reject, request.reason.as_deref()).await
}

pub fn subgroup_routes() -> Router<AppState> {
    Router::new()
        .route("/api/subgroups/:id", put(edit_subgroup))
        .route("/api/subgroups/:id/supervisor-verify", post(supervisor_verify))
        .route("/api/subgroups/:id/quality-verify", post(quality_verify))
        .route("/api/subgroups/:id/reject", post(reject))
}
