//! Database access for qv-server
//!
//! Repository functions take a `&mut SqliteConnection` so the services can
//! run them inside one transaction (`&mut *tx`) or on a pooled connection.

pub mod checklists;
pub mod equipment;
pub mod ftq;
pub mod history;
pub mod sampling_configs;
pub mod subgroups;
pub mod users;
pub mod verifications;

use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::{ApprovalState, Rejection, Signoff};
use qv_common::models::RecordType;
use qv_common::{Error, Result};

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}

pub(crate) fn parse_opt_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

/// Table holding a reviewed record
pub(crate) fn table_for(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::Checklist => "checklists",
        RecordType::Subgroup => "subgroups",
        RecordType::EquipmentCheck => "equipment_checks",
        RecordType::Ftq => "ftq_records",
    }
}

/// Signoff columns shared by every reviewed table
pub(crate) struct SignoffColumns {
    pub supervisor: Option<Signoff>,
    pub quality: Option<Signoff>,
    pub rejection: Option<Rejection>,
}

fn signoff(by: Option<String>, at: Option<NaiveDateTime>) -> Result<Option<Signoff>> {
    match (parse_opt_uuid(by)?, at) {
        (Some(by), Some(at)) => Ok(Some(Signoff { by, at })),
        _ => Ok(None),
    }
}

pub(crate) fn signoffs_from_row(row: &SqliteRow) -> Result<SignoffColumns> {
    let supervisor = signoff(row.get("supervisor_by"), row.get("supervisor_at"))?;
    let quality = signoff(row.get("quality_by"), row.get("quality_at"))?;

    let rejected_by = parse_opt_uuid(row.get("rejected_by"))?;
    let rejected_at: Option<NaiveDateTime> = row.get("rejected_at");
    let reason: Option<String> = row.get("rejection_reason");
    let rejection = match (rejected_by, rejected_at) {
        (Some(by), Some(at)) => Some(Rejection {
            by,
            at,
            reason: reason.unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(SignoffColumns {
        supervisor,
        quality,
        rejection,
    })
}

pub(crate) fn approval_from_row(row: &SqliteRow) -> Result<ApprovalState> {
    let status: String = row.get("status");
    let columns = signoffs_from_row(row)?;
    Ok(ApprovalState {
        status: status.parse()?,
        supervisor: columns.supervisor,
        quality: columns.quality,
        rejection: columns.rejection,
    })
}

/// Write status and signoff columns of a reviewed record
pub(crate) async fn save_signoffs(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    id: Uuid,
    status: &str,
    columns: &SignoffColumns,
    updated_at: Option<NaiveDateTime>,
) -> Result<()> {
    let table = table_for(record_type);
    let touch = if updated_at.is_some() { ", updated_at = ?" } else { "" };
    let sql = format!(
        r#"
        UPDATE {table} SET
            status = ?,
            supervisor_by = ?, supervisor_at = ?,
            quality_by = ?, quality_at = ?,
            rejected_by = ?, rejected_at = ?, rejection_reason = ?{touch}
        WHERE id = ?
        "#,
    );

    let mut query = sqlx::query(&sql)
        .bind(status)
        .bind(columns.supervisor.as_ref().map(|s| s.by.to_string()))
        .bind(columns.supervisor.as_ref().map(|s| s.at))
        .bind(columns.quality.as_ref().map(|s| s.by.to_string()))
        .bind(columns.quality.as_ref().map(|s| s.at))
        .bind(columns.rejection.as_ref().map(|r| r.by.to_string()))
        .bind(columns.rejection.as_ref().map(|r| r.at))
        .bind(columns.rejection.as_ref().map(|r| r.reason.clone()));
    if let Some(at) = updated_at {
        query = query.bind(at);
    }

    let result = query.bind(id.to_string()).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", record_type, id)));
    }
    Ok(())
}

/// Persist an [`ApprovalState`] on a checklist, equipment check or FTQ record
pub(crate) async fn save_approval(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    id: Uuid,
    approval: &ApprovalState,
    updated_at: NaiveDateTime,
) -> Result<()> {
    let columns = SignoffColumns {
        supervisor: approval.supervisor.clone(),
        quality: approval.quality.clone(),
        rejection: approval.rejection.clone(),
    };
    save_signoffs(
        conn,
        record_type,
        id,
        approval.status.as_str(),
        &columns,
        Some(updated_at),
    )
    .await
}

/// Approval state plus owning verification of a reviewed record
pub(crate) async fn load_review_target(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    id: Uuid,
) -> Result<(Uuid, ApprovalState)> {
    let sql = format!(
        r#"
        SELECT verification_id, status,
               supervisor_by, supervisor_at, quality_by, quality_at,
               rejected_by, rejected_at, rejection_reason
        FROM {}
        WHERE id = ?
        "#,
        table_for(record_type)
    );

    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", record_type, id)))?;

    let verification_id: String = row.get("verification_id");
    Ok((parse_uuid(&verification_id)?, approval_from_row(&row)?))
}
