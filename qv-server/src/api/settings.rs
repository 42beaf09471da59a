//! Runtime settings
//!
//! Changing the sampling values replaces the active sampling config in the
//! same transaction as the settings write; checklists already attached to a
//! config keep it.

use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;
use tracing::info;

use qv_common::db::settings::{load_runtime_settings, save_runtime_settings, RuntimeSettings};
use qv_common::shift::ShiftPattern;

use crate::api::identity::CurrentUser;
use crate::db::sampling_configs;
use crate::{ApiResult, AppState};

/// Partial update; omitted values stay unchanged
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub shift_pattern: Option<ShiftPattern>,
    pub sampling_interval_minutes: Option<i64>,
    pub sampling_max_subgroups: Option<i64>,
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<RuntimeSettings>> {
    Ok(Json(load_runtime_settings(&state.db).await?))
}

/// PUT /api/settings (admin)
pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<RuntimeSettings>> {
    user.require_admin()?;

    let current = load_runtime_settings(&state.db).await?;
    let updated = RuntimeSettings {
        shift_pattern: update.shift_pattern.unwrap_or(current.shift_pattern),
        sampling_interval_minutes: update
            .sampling_interval_minutes
            .unwrap_or(current.sampling_interval_minutes),
        sampling_max_subgroups: update
            .sampling_max_subgroups
            .unwrap_or(current.sampling_max_subgroups),
    };
    let mut tx = state.db.begin().await.map_err(qv_common::Error::from)?;
    save_runtime_settings(&mut tx, &updated).await?;
    let replaced = if updated.sampling_plan() != current.sampling_plan() {
        Some(sampling_configs::replace_active(&mut tx, "settings", &updated.sampling_plan()).await?)
    } else {
        None
    };
    tx.commit().await.map_err(qv_common::Error::from)?;

    if let Some(config) = replaced {
        info!(
            config = %config.id,
            interval_minutes = config.interval_minutes,
            max_subgroups = config.max_subgroups,
            "Sampling config replaced"
        );
    }

    info!(
        pattern = updated.shift_pattern.as_str(),
        by = %user.0.username,
        "Runtime settings updated"
    );
    Ok(Json(updated))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).put(update_settings))
}
