//! FTQ record and defect routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use qv_common::approval::ApprovalAction;
use qv_common::models::RecordType;

use crate::api::identity::CurrentUser;
use crate::api::{apply_review, RejectRequest};
use crate::services::ftq::{self, DefectCount, FtqDetail, FtqEdit, NewDefect, NewFtqRecord};
use crate::services::review::ReviewOutcome;
use crate::{ApiResult, AppState};

/// POST /api/ftq
pub async fn create_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<NewFtqRecord>,
) -> ApiResult<(StatusCode, Json<FtqDetail>)> {
    let detail = ftq::create(&state.db, &user.0, request, state.clock.now()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/ftq/:id
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> ApiResult<Json<FtqDetail>> {
    Ok(Json(ftq::detail(&state.db, id).await?))
}

/// PUT /api/ftq/:id
pub async fn edit_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(edit): Json<FtqEdit>,
) -> ApiResult<Json<FtqDetail>> {
    Ok(Json(
        ftq::edit(&state.db, id, &user.0, edit, state.clock.now()).await?,
    ))
}

/// POST /api/ftq/:id/defects
pub async fn add_defect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(defect): Json<NewDefect>,
) -> ApiResult<(StatusCode, Json<FtqDetail>)> {
    let detail = ftq::add_defect(&state.db, id, &user.0, defect, state.clock.now()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// PUT /api/defects/:id
pub async fn update_defect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(request): Json<DefectCount>,
) -> ApiResult<Json<FtqDetail>> {
    let detail =
        ftq::update_defect(&state.db, id, &user.0, request.count, state.clock.now()).await?;
    Ok(Json(detail))
}

/// DELETE /api/defects/:id
pub async fn delete_defect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<FtqDetail>> {
    Ok(Json(
        ftq::delete_defect(&state.db, id, &user.0, state.clock.now()).await?,
    ))
}

pub async fn supervisor_approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> ApiResult<Json<ReviewOutcome>> {
    apply_review(
        &state,
        RecordType::Ftq,
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
        RecordType::Ftq,
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
        RecordType::Ftq,
        id,
        &user,
        ApprovalAction::Reject,
        request.reason.as_deref(),
    )
    .await
}

pub fn ftq_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ftq", post(create_record))
        .route("/api/ftq/:id", get(get_record).put(edit_record))
        .route("/api/ftq/:id/defects", post(add_defect))
        .route(
            "/api/defects/:id",
            put(update_defect).delete(delete_defect),
        )
        .route("/api/ftq/:id/supervisor-approve", post(supervisor_approve))
        .route("/api/ftq/:id/quality-approve", post(quality_approve))
        .route("/api/ftq/:id/reject", post(reject))
}
