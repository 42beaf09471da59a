//! Checklist routes, including the subgroup gate and batch creation

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use qv_common::approval::ApprovalAction;
use qv_common::models::RecordType;
use qv_common::sampling::GateDecision;

use crate::api::identity::CurrentUser;
use crate::api::{apply_review, RejectRequest};
use crate::services::checklist::{self, ChecklistDetail, ChecklistEdit, NewChecklist};
use crate::services::review::ReviewOutcome;
use crate::services::subgroup::{self, SubgroupReadings, SubgroupResponse};
use crate::{ApiResult, AppState};

/// POST /api/checklists
pub async fn create_checklist(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<NewChecklist>,
) -> ApiResult<(StatusCode, Json<ChecklistDetail>)> {
    let detail = checklist::create(
        &state.db,
        &user.0,
        request,
        &state.tolerances,
        state.clock.now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/checklists/:id
pub async fn get_checklist(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> ApiResult<Json<ChecklistDetail>> {
    let detail = checklist::detail(&state.db, id, &state.tolerances, state.clock.now()).await?;
    Ok(Json(detail))
}

/// PUT /api/checklists/:id
pub async fn edit_checklist(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(edit): Json<ChecklistEdit>,
) -> ApiResult<Json<ChecklistDetail>> {
    let detail = checklist::edit(
        &state.db,
        id,
        &user.0,
        edit,
        &state.tolerances,
        state.clock.now(),
    )
    .await?;
    Ok(Json(detail))
}

pub async fn supervisor_approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<ReviewOutcome>> {
    apply_review(
        &state,
        RecordType::Checklist,
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
        RecordType::Checklist,
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
        RecordType::Checklist,
        id,
        &user,
        ApprovalAction::Reject,
        request.reason.as_deref(),
    )
    .await
}

/// GET /api/checklists/:id/subgroup-gate
pub async fn subgroup_gate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> ApiResult<Json<GateDecision>> {
    Ok(Json(checklist::gate(&state.db, id, state.clock.now()).await?))
}

/// POST /api/checklists/:id/subgroups
pub async fn add_subgroup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(request): Json<SubgroupReadings>,
) -> ApiResult<(StatusCode, Json<SubgroupResponse>)> {
    let response = subgroup::add(
        &state.db,
        id,
        &user.0,
        request.readings,
        &state.tolerances,
        state.clock.now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub fn checklist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/checklists", post(create_checklist))
        .route(
            "/api/checklists/:id",
            get(get_checklist).put(edit_checklist),
        )
        .route(
            "/api/checklists/:id/supervisor-approve",
            post(supervisor_approve),
        )
        .route("/api/checklists/:id/quality-approve", post(quality_approve))
        .route("/api/checklists/:id/reject", post(reject))
        .route("/api/checklists/:id/subgroup-gate", get(subgroup_gate))
        .route("/api/checklists/:id/subgroups", post(add_subgroup))
}
