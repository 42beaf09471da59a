//! Subgroup batches: gated creation, edits and verification

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use qv_common::approval::{ApprovalStatus, SubgroupStatus};
use qv_common::db::settings::load_runtime_settings;
use qv_common::models::{RecordType, Subgroup, User};
use qv_common::sampling::{evaluate, GateDecision, MAX_READINGS_PER_SUBGROUP};
use qv_common::tolerance::{ToleranceTable, ToleranceWarning};
use qv_common::{Error, Result};

use crate::db::{history, subgroups};
use crate::services::checklist::{self, resolve_sampling_config};
use crate::services::{require_owner, require_reason, verification};

#[derive(Debug, Clone, Deserialize)]
pub struct SubgroupReadings {
    pub readings: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgroupResponse {
    #[serde(flatten)]
    pub subgroup: Subgroup,
    pub warnings: Vec<ToleranceWarning>,
    /// Gate state after a new batch was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateDecision>,
}

/// Subgroup verification step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyAction {
    Supervisor,
    Quality,
    Reject,
}

fn validate_readings(readings: &[f64]) -> Result<()> {
    if readings.is_empty() {
        return Err(Error::InvalidInput(
            "A subgroup needs at least one reading".to_string(),
        ));
    }
    if readings.len() > MAX_READINGS_PER_SUBGROUP {
        return Err(Error::InvalidInput(format!(
            "A subgroup holds at most {} readings, got {}",
            MAX_READINGS_PER_SUBGROUP,
            readings.len()
        )));
    }
    if readings.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(
            "Subgroup readings must be finite numbers".to_string(),
        ));
    }
    Ok(())
}

/// Record the next batch if its slot has been reached
pub async fn add(
    pool: &SqlitePool,
    checklist_id: Uuid,
    user: &User,
    readings: Vec<f64>,
    tolerances: &ToleranceTable,
    now: NaiveDateTime,
) -> Result<SubgroupResponse> {
    validate_readings(&readings)?;
    let settings = load_runtime_settings(pool).await?;

    let mut tx = pool.begin().await?;
    let checklist = checklist::load(&mut tx, checklist_id).await?;
    let verification = verification::load(&mut tx, checklist.verification_id).await?;
    require_owner(user, &verification)?;
    if checklist.approval.status == ApprovalStatus::QualityApproved {
        return Err(Error::Conflict(
            "Checklist is locked after quality approval".to_string(),
        ));
    }

    let plan = resolve_sampling_config(&mut tx, &checklist, &settings)
        .await?
        .plan();
    let recorded = subgroups::count(&mut tx, checklist_id).await?;
    let decision = evaluate(checklist.shift_start, &plan, recorded, now);
    if !decision.can_add {
        let message = match decision.next_allowed_at {
            Some(at) => format!(
                "Subgroup {} opens at {}",
                recorded + 1,
                at.format("%Y-%m-%d %H:%M")
            ),
            None => format!("All {} subgroups are recorded", plan.max_subgroups),
        };
        return Err(Error::Conflict(message));
    }

    let subgroup = subgroups::insert(&mut tx, checklist_id, recorded + 1, readings, now).await?;
    history::append(
        &mut tx,
        RecordType::Subgroup,
        subgroup.id,
        None,
        SubgroupStatus::Pending.as_str(),
        "create",
        user.id,
        None,
        now,
    )
    .await?;
    tx.commit().await?;

    info!(
        checklist = %checklist_id,
        sequence = subgroup.sequence,
        readings = subgroup.readings.len(),
        "Subgroup recorded"
    );

    let warnings = tolerances.check_subgroup(&subgroup.readings);
    let gate = evaluate(checklist.shift_start, &plan, recorded + 1, now);
    Ok(SubgroupResponse {
        subgroup,
        warnings,
        gate: Some(gate),
    })
}

async fn load(conn: &mut sqlx::SqliteConnection, id: Uuid) -> Result<Subgroup> {
    subgroups::get(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("subgroup {}", id)))
}

/// Replace the readings while the checklist is pending or rejected; a
/// verified or rejected batch goes back to pending
pub async fn edit(
    pool: &SqlitePool,
    id: Uuid,
    user: &User,
    readings: Vec<f64>,
    tolerances: &ToleranceTable,
    now: NaiveDateTime,
) -> Result<SubgroupResponse> {
    validate_readings(&readings)?;

    let mut tx = pool.begin().await?;
    let mut subgroup = load(&mut tx, id).await?;
    let checklist = checklist::load(&mut tx, subgroup.checklist_id).await?;
    let verification = verification::load(&mut tx, checklist.verification_id).await?;
    require_owner(user, &verification)?;
    if !matches!(
        checklist.approval.status,
        ApprovalStatus::Pending | ApprovalStatus::Rejected
    ) {
        return Err(Error::Conflict(format!(
            "Checklist is {}; subgroup readings are locked",
            checklist.approval.status
        )));
    }

    let transition = subgroup.verification.begin_edit()?;
    subgroup.readings = readings;
    subgroups::update_readings(&mut tx, id, &subgroup.readings).await?;
    if let Some(transition) = &transition {
        subgroups::save_verification(&mut tx, id, &subgroup.verification).await?;
        history::record_transition(&mut tx, RecordType::Subgroup, id, transition, user.id, None, now)
            .await?;
    }
    tx.commit().await?;

    info!(subgroup = %id, sequence = subgroup.sequence, "Subgroup readings edited");

    let warnings = tolerances.check_subgroup(&subgroup.readings);
    Ok(SubgroupResponse {
        subgroup,
        warnings,
        gate: None,
    })
}

pub async fn verify(
    pool: &SqlitePool,
    id: Uuid,
    user: &User,
    action: VerifyAction,
    reason: Option<&str>,
    tolerances: &ToleranceTable,
    now: NaiveDateTime,
) -> Result<SubgroupResponse> {
    let allowed = match action {
        VerifyAction::Supervisor => user.role.can_supervise(),
        VerifyAction::Quality => user.role.can_quality_review(),
        VerifyAction::Reject => user.role.can_reject(),
    };
    if !allowed {
        return Err(Error::Forbidden(format!(
            "Role {} may not verify subgroups at this stage",
            user.role
        )));
    }
    let reason = match action {
        VerifyAction::Reject => Some(require_reason(reason)?),
        _ => None,
    };

    let mut tx = pool.begin().await?;
    let mut subgroup = load(&mut tx, id).await?;
    let transition = match action {
        VerifyAction::Supervisor => subgroup.verification.supervisor_verify(user.id, now)?,
        VerifyAction::Quality => subgroup.verification.quality_verify(user.id, now)?,
        VerifyAction::Reject => {
            subgroup
                .verification
                .reject(user.id, now, reason.unwrap_or_default())?
        }
    };
    subgroups::save_verification(&mut tx, id, &subgroup.verification).await?;
    history::record_transition(&mut tx, RecordType::Subgroup, id, &transition, user.id, reason, now)
        .await?;
    tx.commit().await?;

    info!(
        subgroup = %id,
        from = %transition.from,
        to = %transition.to,
        by = %user.username,
        "Subgroup verification updated"
    );

    let warnings = tolerances.check_subgroup(&subgroup.readings);
    Ok(SubgroupResponse {
        subgroup,
        warnings,
        gate: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_count_limits() {
        assert!(validate_readings(&[]).is_err());
        assert!(validate_readings(&[1.0; MAX_READINGS_PER_SUBGROUP]).is_ok());
        assert!(validate_readings(&[1.0; MAX_READINGS_PER_SUBGROUP + 1]).is_err());
        assert!(validate_readings(&[1.0, f64::NAN]).is_err());
    }
}
