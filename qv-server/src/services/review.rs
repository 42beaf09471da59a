//! Supervisor and quality review of checklists, equipment checks and FTQ
//! records

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use qv_common::approval::{ApprovalAction, ApprovalState, ApprovalStatus};
use qv_common::db::settings::load_runtime_settings;
use qv_common::models::{RecordType, User, VerificationStatus};
use qv_common::tolerance::{ToleranceTable, ToleranceWarning};
use qv_common::{Error, Result};

use crate::db::{checklists, history, load_review_target, save_approval, subgroups};
use crate::services::checklist::{resolve_sampling_config, warnings_for};
use crate::services::{authorize_review, require_reason, verification};

/// Result of a review action
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub record_type: RecordType,
    pub record_id: Uuid,
    pub from: ApprovalStatus,
    pub approval: ApprovalState,
    pub verification: VerificationStatus,
    /// Out-of-tolerance readings seen at supervisor approval; advisory only
    pub warnings: Vec<ToleranceWarning>,
}

/// Apply a supervisor approval, quality approval or rejection
#[allow(clippy::too_many_arguments)]
pub async fn review(
    pool: &SqlitePool,
    tolerances: &ToleranceTable,
    record_type: RecordType,
    id: Uuid,
    user: &User,
    action: ApprovalAction,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<ReviewOutcome> {
    if record_type == RecordType::Subgroup {
        return Err(Error::Internal(
            "Subgroups are verified through the subgroup service".to_string(),
        ));
    }
    if action == ApprovalAction::Resubmit {
        return Err(Error::InvalidInput(
            "Records are resubmitted by editing them".to_string(),
        ));
    }
    authorize_review(user, action)?;
    let reason = match action {
        ApprovalAction::Reject => Some(require_reason(reason)?),
        _ => None,
    };
    let settings = load_runtime_settings(pool).await?;

    let mut tx = pool.begin().await?;
    let (verification_id, mut approval) = load_review_target(&mut tx, record_type, id).await?;
    let mut warnings = Vec::new();

    // All subgroup batches must be in before the supervisor signs a checklist
    if record_type == RecordType::Checklist && action == ApprovalAction::SupervisorApprove {
        let checklist = checklists::get(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("checklist {}", id)))?;
        let config = resolve_sampling_config(&mut tx, &checklist, &settings).await?;
        let recorded = subgroups::count(&mut tx, id).await?;
        let required = config.plan().max_subgroups;
        if recorded < required {
            return Err(Error::Conflict(format!(
                "Checklist has {} of {} subgroups recorded",
                recorded, required
            )));
        }
        let recorded_subgroups = subgroups::list(&mut tx, id).await?;
        warnings = warnings_for(tolerances, &checklist, &recorded_subgroups);
    }

    let transition = approval.apply(action, user.id, now, reason)?;
    save_approval(&mut tx, record_type, id, &approval, now).await?;
    history::record_transition(&mut tx, record_type, id, &transition, user.id, reason, now).await?;
    let verification = verification::refresh(&mut tx, verification_id, now).await?;

    tx.commit().await?;

    info!(
        record_type = %record_type,
        record_id = %id,
        from = %transition.from,
        to = %transition.to,
        by = %user.username,
        "Review action applied"
    );
    if !warnings.is_empty() {
        warn!(
            record_id = %id,
            count = warnings.len(),
            fields = ?warnings.iter().map(|w| w.field.as_str()).collect::<Vec<_>>(),
            "Approved with out-of-tolerance readings"
        );
    }

    Ok(ReviewOutcome {
        record_type,
        record_id: id,
        from: transition.from,
        approval,
        verification,
        warnings,
    })
}
