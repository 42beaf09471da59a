//! First Time Quality records and defect lines
//!
//! `total_defects` is recomputed from the defect lines inside the same
//! transaction as every defect change.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use qv_common::approval::ApprovalStatus;
use qv_common::models::{DefectRecord, FtqRecord, RecordType, User};
use qv_common::{Error, Result};

use crate::db::{ftq, history, save_approval};
use crate::services::{require_owner, require_text, verification};

#[derive(Debug, Clone, Deserialize)]
pub struct NewFtqRecord {
    pub verification_id: Uuid,
    pub model: String,
    #[serde(default)]
    pub total_inspected: i64,
}

/// Header edit; omitted fields stay unchanged
#[derive(Debug, Clone, Deserialize)]
pub struct FtqEdit {
    pub model: Option<String>,
    pub total_inspected: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDefect {
    pub operation: String,
    pub defect_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefectCount {
    pub count: i64,
}

/// FTQ record with its defect lines
#[derive(Debug, Clone, Serialize)]
pub struct FtqDetail {
    #[serde(flatten)]
    pub record: FtqRecord,
    pub defects: Vec<DefectRecord>,
    pub ftq_percent: Option<f64>,
}

fn require_count(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        Err(Error::InvalidInput(format!(
            "{} must not be negative, got {}",
            field, value
        )))
    } else {
        Ok(())
    }
}

async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<FtqRecord> {
    ftq::get(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("FTQ record {}", id)))
}

async fn detail_on(conn: &mut SqliteConnection, id: Uuid) -> Result<FtqDetail> {
    let record = load(conn, id).await?;
    let defects = ftq::list_defects(conn, id).await?;
    Ok(FtqDetail {
        ftq_percent: record.ftq_percent(),
        record,
        defects,
    })
}

pub async fn detail(pool: &SqlitePool, id: Uuid) -> Result<FtqDetail> {
    let mut conn = pool.acquire().await?;
    detail_on(&mut conn, id).await
}

/// Owner check plus the edit guard; a rejected record is resubmitted
async fn begin_change(
    conn: &mut SqliteConnection,
    id: Uuid,
    user: &User,
    now: NaiveDateTime,
) -> Result<FtqRecord> {
    let mut record = load(conn, id).await?;
    let verification = verification::load(conn, record.verification_id).await?;
    require_owner(user, &verification)?;

    let transition = record.approval.begin_edit()?;
    if let Some(transition) = transition {
        save_approval(conn, RecordType::Ftq, id, &record.approval, now).await?;
        history::record_transition(conn, RecordType::Ftq, id, &transition, user.id, None, now)
            .await?;
        info!(ftq = %id, by = %user.username, "FTQ record resubmitted");
    }
    Ok(record)
}

pub async fn create(
    pool: &SqlitePool,
    user: &User,
    request: NewFtqRecord,
    now: NaiveDateTime,
) -> Result<FtqDetail> {
    require_text("model", &request.model)?;
    require_count("total_inspected", request.total_inspected)?;

    let mut tx = pool.begin().await?;
    let verification = verification::load(&mut tx, request.verification_id).await?;
    require_owner(user, &verification)?;
    if ftq::get_by_verification(&mut tx, verification.id)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(
            "This shift record already has an FTQ record".to_string(),
        ));
    }

    let record = ftq::insert(
        &mut tx,
        verification.id,
        verification.date,
        verification.shift,
        request.model.trim(),
        request.total_inspected,
        now,
    )
    .await?;
    history::append(
        &mut tx,
        RecordType::Ftq,
        record.id,
        None,
        ApprovalStatus::Pending.as_str(),
        "create",
        user.id,
        None,
        now,
    )
    .await?;
    verification::refresh(&mut tx, verification.id, now).await?;
    let detail = detail_on(&mut tx, record.id).await?;
    tx.commit().await?;

    info!(ftq = %record.id, model = %record.model, by = %user.username, "FTQ record created");
    Ok(detail)
}

pub async fn edit(
    pool: &SqlitePool,
    id: Uuid,
    user: &User,
    edit: FtqEdit,
    now: NaiveDateTime,
) -> Result<FtqDetail> {
    if let Some(model) = &edit.model {
        require_text("model", model)?;
    }
    if let Some(total) = edit.total_inspected {
        require_count("total_inspected", total)?;
    }

    let mut tx = pool.begin().await?;
    let record = begin_change(&mut tx, id, user, now).await?;
    let model = edit
        .model
        .as_deref()
        .map(str::trim)
        .unwrap_or(record.model.as_str())
        .to_string();
    let total_inspected = edit.total_inspected.unwrap_or(record.total_inspected);
    ftq::update_header(&mut tx, id, &model, total_inspected, now).await?;
    verification::refresh(&mut tx, record.verification_id, now).await?;
    let detail = detail_on(&mut tx, id).await?;
    tx.commit().await?;

    Ok(detail)
}

pub async fn add_defect(
    pool: &SqlitePool,
    id: Uuid,
    user: &User,
    defect: NewDefect,
    now: NaiveDateTime,
) -> Result<FtqDetail> {
    require_text("operation", &defect.operation)?;
    require_text("defect_type", &defect.defect_type)?;
    require_count("count", defect.count)?;

    let mut tx = pool.begin().await?;
    let record = begin_change(&mut tx, id, user, now).await?;
    ftq::insert_defect(
        &mut tx,
        id,
        defect.operation.trim(),
        defect.defect_type.trim(),
        defect.count,
        now,
    )
    .await?;
    let total = ftq::recompute_total(&mut tx, id, now).await?;
    verification::refresh(&mut tx, record.verification_id, now).await?;
    let detail = detail_on(&mut tx, id).await?;
    tx.commit().await?;

    info!(ftq = %id, total_defects = total, "Defect recorded");
    Ok(detail)
}

async fn load_defect(conn: &mut SqliteConnection, id: Uuid) -> Result<DefectRecord> {
    ftq::get_defect(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("defect {}", id)))
}

pub async fn update_defect(
    pool: &SqlitePool,
    defect_id: Uuid,
    user: &User,
    count: i64,
    now: NaiveDateTime,
) -> Result<FtqDetail> {
    require_count("count", count)?;

    let mut tx = pool.begin().await?;
    let defect = load_defect(&mut tx, defect_id).await?;
    let record = begin_change(&mut tx, defect.ftq_id, user, now).await?;
    ftq::update_defect_count(&mut tx, defect_id, count).await?;
    let total = ftq::recompute_total(&mut tx, record.id, now).await?;
    verification::refresh(&mut tx, record.verification_id, now).await?;
    let detail = detail_on(&mut tx, record.id).await?;
    tx.commit().await?;

    info!(ftq = %record.id, defect = %defect_id, total_defects = total, "Defect count updated");
    Ok(detail)
}

pub async fn delete_defect(
    pool: &SqlitePool,
    defect_id: Uuid,
    user: &User,
    now: NaiveDateTime,
) -> Result<FtqDetail> {
    let mut tx = pool.begin().await?;
    let defect = load_defect(&mut tx, defect_id).await?;
    let record = begin_change(&mut tx, defect.ftq_id, user, now).await?;
    ftq::delete_defect(&mut tx, defect_id).await?;
    let total = ftq::recompute_total(&mut tx, record.id, now).await?;
    verification::refresh(&mut tx, record.verification_id, now).await?;
    let detail = detail_on(&mut tx, record.id).await?;
    tx.commit().await?;

    info!(ftq = %record.id, defect = %defect_id, total_defects = total, "Defect removed");
    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_counts_rejected() {
        assert!(require_count("count", 0).is_ok());
        assert!(require_count("count", 12).is_ok());
        assert!(matches!(
            require_count("count", -1),
            Err(Error::InvalidInput(_))
        ));
    }
}
