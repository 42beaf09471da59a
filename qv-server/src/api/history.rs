//! Approval history

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use qv_common::models::{HistoryEntry, RecordType};

use crate::api::identity::CurrentUser;
use crate::db::history;
use crate::{ApiResult, AppState};

/// GET /api/history/:record_type/:id
///
/// `record_type` is one of `checklist`, `subgroup`, `equipment_check`, `ftq`.
pub async fn record_history(
    State(state): State<AppState>,
    Path((record_type, id)): Path<(RecordType, Uuid)>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let mut conn = state.db.acquire().await.map_err(qv_common::Error::from)?;
    Ok(Json(history::list(&mut conn, record_type, id).await?))
}

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/api/history/:record_type/:id", get(record_history))
}
