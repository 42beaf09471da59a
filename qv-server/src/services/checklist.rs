//! Checklist creation, editing and the subgroup timing gate

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use qv_common::approval::ApprovalStatus;
use qv_common::db::settings::{load_runtime_settings, RuntimeSettings};
use qv_common::models::{Checklist, ChecklistReadings, RecordType, SamplingConfig, Subgroup, User};
use qv_common::sampling::{evaluate, GateDecision};
use qv_common::tolerance::{ToleranceTable, ToleranceWarning};
use qv_common::{Error, Result};

use crate::db::{checklists, history, sampling_configs, subgroups};
use crate::services::{require_owner, require_text, verification};

#[derive(Debug, Clone, Deserialize)]
pub struct NewChecklist {
    pub verification_id: Uuid,
    pub model: String,
    pub line: String,
    pub machine: String,
    #[serde(default)]
    pub readings: ChecklistReadings,
}

/// Operator edit; omitted header fields stay unchanged
#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistEdit {
    pub model: Option<String>,
    pub line: Option<String>,
    pub machine: Option<String>,
    pub readings: ChecklistReadings,
}

/// Checklist with subgroups, gate state and advisory warnings
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistDetail {
    #[serde(flatten)]
    pub checklist: Checklist,
    pub subgroups: Vec<Subgroup>,
    pub gate: GateDecision,
    pub nok_checks: Vec<&'static str>,
    pub warnings: Vec<ToleranceWarning>,
}

/// Tolerance warnings for the checklist readings and every subgroup
pub fn warnings_for(
    tolerances: &ToleranceTable,
    checklist: &Checklist,
    subgroups: &[Subgroup],
) -> Vec<ToleranceWarning> {
    let mut warnings = tolerances.check(checklist.readings.numeric());
    for subgroup in subgroups {
        warnings.extend(tolerances.check_subgroup(&subgroup.readings));
    }
    warnings
}

pub(crate) async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Checklist> {
    checklists::get(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("checklist {}", id)))
}

/// Sampling config governing a checklist
///
/// A checklist without one is attached to the active config on first use;
/// when no config is active one is created from the runtime settings.
pub(crate) async fn resolve_sampling_config(
    conn: &mut SqliteConnection,
    checklist: &Checklist,
    settings: &RuntimeSettings,
) -> Result<SamplingConfig> {
    if let Some(config_id) = checklist.sampling_config_id {
        match sampling_configs::get(conn, config_id).await? {
            Some(config) => return Ok(config),
            None => warn!(
                checklist = %checklist.id,
                config = %config_id,
                "Attached sampling config missing, reattaching"
            ),
        }
    }

    let config = match sampling_configs::active(conn).await? {
        Some(config) => config,
        None => sampling_configs::insert(conn, "default", &settings.sampling_plan()).await?,
    };
    checklists::attach_sampling_config(conn, checklist.id, config.id).await?;
    info!(
        checklist = %checklist.id,
        interval_minutes = config.interval_minutes,
        max_subgroups = config.max_subgroups,
        "Attached sampling config"
    );
    Ok(config)
}

/// Gate decision without attaching a config (read path)
async fn peek_gate(
    conn: &mut SqliteConnection,
    checklist: &Checklist,
    recorded: u32,
    settings: &RuntimeSettings,
    now: NaiveDateTime,
) -> Result<GateDecision> {
    let attached = match checklist.sampling_config_id {
        Some(id) => sampling_configs::get(conn, id).await?,
        None => None,
    };
    let plan = match attached {
        Some(config) => config.plan(),
        None => match sampling_configs::active(conn).await? {
            Some(config) => config.plan(),
            None => settings.sampling_plan(),
        },
    };
    Ok(evaluate(checklist.shift_start, &plan, recorded, now))
}

async fn detail_on(
    conn: &mut SqliteConnection,
    checklist: Checklist,
    tolerances: &ToleranceTable,
    settings: &RuntimeSettings,
    now: NaiveDateTime,
) -> Result<ChecklistDetail> {
    let subgroups = subgroups::list(conn, checklist.id).await?;
    let gate = peek_gate(conn, &checklist, subgroups.len() as u32, settings, now).await?;
    let warnings = warnings_for(tolerances, &checklist, &subgroups);
    let nok_checks = checklist.readings.nok_checks();

    Ok(ChecklistDetail {
        checklist,
        subgroups,
        gate,
        nok_checks,
        warnings,
    })
}

pub async fn detail(
    pool: &SqlitePool,
    id: Uuid,
    tolerances: &ToleranceTable,
    now: NaiveDateTime,
) -> Result<ChecklistDetail> {
    let settings = load_runtime_settings(pool).await?;
    let mut conn = pool.acquire().await?;
    let checklist = load(&mut conn, id).await?;
    detail_on(&mut conn, checklist, tolerances, &settings, now).await
}

pub async fn create(
    pool: &SqlitePool,
    user: &User,
    request: NewChecklist,
    tolerances: &ToleranceTable,
    now: NaiveDateTime,
) -> Result<ChecklistDetail> {
    require_text("model", &request.model)?;
    require_text("line", &request.line)?;
    require_text("machine", &request.machine)?;
    let settings = load_runtime_settings(pool).await?;

    let mut tx = pool.begin().await?;
    let verification = verification::load(&mut tx, request.verification_id).await?;
    require_owner(user, &verification)?;
    if checklists::get_by_verification(&mut tx, verification.id)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(
            "This shift record already has a checklist".to_string(),
        ));
    }

    let checklist = checklists::new_checklist(
        verification.id,
        request.model.trim().to_string(),
        request.line.trim().to_string(),
        request.machine.trim().to_string(),
        verification.shift.start_on(verification.date),
        request.readings,
        now,
    );
    checklists::insert(&mut tx, &checklist).await?;
    history::append(
        &mut tx,
        RecordType::Checklist,
        checklist.id,
        None,
        ApprovalStatus::Pending.as_str(),
        "create",
        user.id,
        None,
        now,
    )
    .await?;
    verification::refresh(&mut tx, verification.id, now).await?;

    let detail = detail_on(&mut tx, checklist, tolerances, &settings, now).await?;
    tx.commit().await?;

    info!(
        checklist = %detail.checklist.id,
        line = %detail.checklist.line,
        machine = %detail.checklist.machine,
        by = %user.username,
        "Checklist created"
    );
    if !detail.warnings.is_empty() {
        warn!(
            checklist = %detail.checklist.id,
            count = detail.warnings.len(),
            "Checklist readings outside tolerance"
        );
    }
    Ok(detail)
}

/// Operator edit; a rejected checklist returns to pending (resubmission)
pub async fn edit(
    pool: &SqlitePool,
    id: Uuid,
    user: &User,
    edit: ChecklistEdit,
    tolerances: &ToleranceTable,
    now: NaiveDateTime,
) -> Result<ChecklistDetail> {
    let settings = load_runtime_settings(pool).await?;

    let mut tx = pool.begin().await?;
    let mut checklist = load(&mut tx, id).await?;
    let verification = verification::load(&mut tx, checklist.verification_id).await?;
    require_owner(user, &verification)?;

    let transition = checklist.approval.begin_edit()?;

    if let Some(model) = edit.model {
        require_text("model", &model)?;
        checklist.model = model.trim().to_string();
    }
    if let Some(line) = edit.line {
        require_text("line", &line)?;
        checklist.line = line.trim().to_string();
    }
    if let Some(machine) = edit.machine {
        require_text("machine", &machine)?;
        checklist.machine = machine.trim().to_string();
    }
    checklist.readings = edit.readings;
    checklist.updated_at = now;
    checklists::update_contents(&mut tx, &checklist).await?;

    if let Some(transition) = &transition {
        crate::db::save_approval(&mut tx, RecordType::Checklist, id, &checklist.approval, now)
            .await?;
        history::record_transition(&mut tx, RecordType::Checklist, id, transition, user.id, None, now)
            .await?;
        info!(checklist = %id, by = %user.username, "Checklist resubmitted");
    }
    verification::refresh(&mut tx, verification.id, now).await?;

    let detail = detail_on(&mut tx, checklist, tolerances, &settings, now).await?;
    tx.commit().await?;
    Ok(detail)
}

/// Gate lookup; attaches the active sampling config on first use
pub async fn gate(pool: &SqlitePool, id: Uuid, now: NaiveDateTime) -> Result<GateDecision> {
    let settings = load_runtime_settings(pool).await?;

    let mut tx = pool.begin().await?;
    let checklist = load(&mut tx, id).await?;
    let config = resolve_sampling_config(&mut tx, &checklist, &settings).await?;
    let recorded = subgroups::count(&mut tx, id).await?;
    tx.commit().await?;

    Ok(evaluate(checklist.shift_start, &config.plan(), recorded, now))
}
