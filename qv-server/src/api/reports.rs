//! Report routes

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::identity::CurrentUser;
use crate::services::reports::{self, ChecklistSummaryRow, Dashboard, FtqSummaryRow, GroupBy};
use crate::{ApiResult, AppState};

/// Date range query; both ends default to today
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub group_by: GroupBy,
}

impl RangeQuery {
    pub(crate) fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or(today);
        (self.from.unwrap_or(to), to)
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub date: Option<NaiveDate>,
}

/// GET /api/reports/checklists?from&to&group_by
pub async fn checklist_report(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<ChecklistSummaryRow>>> {
    let (from, to) = query.resolve(state.clock.now().date());
    let rows = reports::checklist_summary(&state.db, from, to, query.group_by).await?;
    Ok(Json(rows))
}

/// GET /api/reports/ftq?from&to&group_by
pub async fn ftq_report(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<FtqSummaryRow>>> {
    let (from, to) = query.resolve(state.clock.now().date());
    let rows = reports::ftq_summary(&state.db, from, to, query.group_by).await?;
    Ok(Json(rows))
}

/// GET /api/reports/dashboard?date
pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    _user: CurrentUser,
) -> ApiResult<Json<Dashboard>> {
    let date = query.date.unwrap_or_else(|| state.clock.now().date());
    Ok(Json(reports::dashboard(&state.db, date).await?))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/checklists", get(checklist_report))
        .route("/api/reports/ftq", get(ftq_report))
        .route("/api/reports/dashboard", get(dashboard))
}
