//! HTTP API handlers for qv-server
//!
//! JSON in and out. GET routes read; POST, PUT and DELETE drive the
//! workflow. Every route except `/` and `/health` needs the caller's
//! identity header (see [`identity`]).

pub mod checklists;
pub mod equipment;
pub mod export;
pub mod ftq;
pub mod health;
pub mod history;
pub mod identity;
pub mod reports;
pub mod settings;
pub mod shift;
pub mod subgroups;
pub mod ui;
pub mod users;
pub mod verifications;

pub use checklists::checklist_routes;
pub use equipment::equipment_routes;
pub use export::export_routes;
pub use ftq::ftq_routes;
pub use health::health_routes;
pub use history::history_routes;
pub use reports::report_routes;
pub use settings::settings_routes;
pub use shift::shift_routes;
pub use subgroups::subgroup_routes;
pub use ui::ui_routes;
pub use users::user_routes;
pub use verifications::verification_routes;

use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use qv_common::approval::ApprovalAction;
use qv_common::models::RecordType;

use crate::services::review::{self, ReviewOutcome};
use crate::{ApiResult, AppState};
use self::identity::CurrentUser;

/// Body of a reject request
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// Shared body of the approve and reject handlers
pub(crate) async fn apply_review(
    state: &AppState,
    record_type: RecordType,
    id: Uuid,
    user: &CurrentUser,
    action: ApprovalAction,
    reason: Option<&str>,
) -> ApiResult<Json<ReviewOutcome>> {
    let outcome = review::review(
        &state.db,
        &state.tolerances,
        record_type,
        id,
        &user.0,
        action,
        reason,
        state.clock.now(),
    )
    .await?;
    Ok(Json(outcome))
}
