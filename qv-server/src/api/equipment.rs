//! Equipment check routes (EP and DTPM)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use qv_common::approval::ApprovalAction;
use qv_common::models::{EquipmentChange, EquipmentCheck, RecordType};

use crate::api::identity::CurrentUser;
use crate::api::{apply_review, RejectRequest};
use crate::services::equipment::{self, EntryUpdate, NewEquipmentCheck};
use crate::services::review::ReviewOutcome;
use crate::{ApiResult, AppState};

/// POST /api/equipment-checks
pub async fn create_check(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<NewEquipmentCheck>,
) -> ApiResult<(StatusCode, Json<EquipmentCheck>)> {
    let check = equipment::create(&state.db, &user.0, request, state.clock.now()).await?;
    Ok((StatusCode::CREATED, Json(check)))
}

/// GET /api/equipment-checks/:id
pub async fn get_check(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> ApiResult<Json<EquipmentCheck>> {
    Ok(Json(equipment::get(&state.db, id).await?))
}

/// PUT /api/equipment-checks/:id/entries/:code
pub async fn update_entry(
    State(state): State<AppState>,
    Path((id, code)): Path<(Uuid, String)>,
    user: CurrentUser,
    Json(update): Json<EntryUpdate>,
) -> ApiResult<Json<EquipmentCheck>> {
    let check =
        equipment::update_entry(&state.db, id, &code, &user.0, update, state.clock.now()).await?;
    Ok(Json(check))
}

/// GET /api/equipment-checks/:id/history
pub async fn change_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<EquipmentChange>>> {
    Ok(Json(equipment::changes(&state.db, id).await?))
}

pub async fn supervisor_approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<ReviewOutcome>> {
    apply_review(
        &state,
        RecordType::EquipmentCheck,
        id,
        &user,
        ApprovalAction::SupervisorApprove,
        None,
    )
    .await
}

pub async fn quality_approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<ReviewOutcome>> {
    apply_review(
        &state,
        RecordType::EquipmentCheck,
        id,
        &user,
        ApprovalAction::QualityApprove,
        None,
    )
    .await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(request): Json<RejectRequest>,
) -> ApiResult<Json<ReviewOutcome>> {
    apply_review(
        &state,
        RecordType::EquipmentCheck,
        id,
        &user,
        ApprovalAction::Reject,
        request.reason.as_deref(),
    )
    .await
}

pub fn equipment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/equipment-checks", post(create_check))
        .route("/api/equipment-checks/:id", get(get_check))
        .route(
            "/api/equipment-checks/:id/entries/:code",
            put(update_entry),
        )
        .route("/api/equipment-checks/:id/history", get(change_history))
        .route(
            "/api/equipment-checks/:id/supervisor-approve",
            post(supervisor_approve),
        )
        .route(
            "/api/equipment-checks/:id/quality-approve",
            post(quality_approve),
        )
        .route("/api/equipment-checks/:id/reject", post(reject))
}
