//! Excel download

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::api::identity::CurrentUser;
use crate::api::reports::RangeQuery;
use crate::services::export;
use crate::{ApiResult, AppState};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// GET /api/export/checklists.xlsx?from&to
pub async fn export_checklists(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
    _user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let (from, to) = query.resolve(state.clock.now().date());
    let bytes = export::export_checklists(
        &state.db,
        &state.export_template,
        &state.tolerances,
        from,
        to,
    )
    .await?;

    let disposition = format!(
        "attachment; filename=\"checklists_{}_{}.xlsx\"",
        from.format("%Y%m%d"),
        to.format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub fn export_routes() -> Router<AppState> {
    Router::new().route("/api/export/checklists.xlsx", get(export_checklists))
}
