//! Current shift lookup

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use qv_common::db::settings::get_shift_pattern;
use qv_common::shift::{CurrentShift, ShiftPattern};

use crate::api::identity::CurrentUser;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct CurrentShiftResponse {
    pub pattern: ShiftPattern,
    #[serde(flatten)]
    pub current: CurrentShift,
}

/// GET /api/shift/current
pub async fn current_shift(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<CurrentShiftResponse>> {
    let pattern = get_shift_pattern(&state.db).await?;
    let current = CurrentShift::from_clock(pattern, state.clock.as_ref());

    Ok(Json(CurrentShiftResponse {
        pattern,
        current,
    }))
}

pub fn shift_routes() -> Router<AppState> {
    Router::new().route("/api/shift/current", get(current_shift))
}
