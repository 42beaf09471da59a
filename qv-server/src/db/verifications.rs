//! Verification status rows: one per operator, shift and date

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::ApprovalStatus;
use qv_common::models::{ChildStatuses, Notifications, VerificationState, VerificationStatus};
use qv_common::shift::Shift;
use qv_common::Result;

use super::parse_uuid;

const COLUMNS: &str = "id, operator_id, date, shift, status, \
     notify_supervisor, notify_quality, notify_operator, created_at, updated_at";

fn verification_from_row(row: &SqliteRow) -> Result<VerificationStatus> {
    let id: String = row.get("id");
    let operator_id: String = row.get("operator_id");
    let shift: String = row.get("shift");
    let status: String = row.get("status");

    Ok(VerificationStatus {
        id: parse_uuid(&id)?,
        operator_id: parse_uuid(&operator_id)?,
        date: row.get("date"),
        shift: shift.parse()?,
        status: status.parse()?,
        notifications: Notifications {
            supervisor: row.get("notify_supervisor"),
            quality: row.get("notify_quality"),
            operator: row.get("notify_operator"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(
    conn: &mut SqliteConnection,
    operator_id: Uuid,
    date: NaiveDate,
    shift: Shift,
) -> Result<Option<VerificationStatus>> {
    let sql = format!(
        "SELECT {} FROM verification_statuses WHERE operator_id = ? AND date = ? AND shift = ?",
        COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(operator_id.to_string())
        .bind(date)
        .bind(shift.code())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(verification_from_row).transpose()
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<VerificationStatus>> {
    let sql = format!("SELECT {} FROM verification_statuses WHERE id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(verification_from_row).transpose()
}

/// Insert unless a row for (operator, date, shift) exists; returns the row
/// and whether it was created
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    operator_id: Uuid,
    date: NaiveDate,
    shift: Shift,
    now: NaiveDateTime,
) -> Result<(VerificationStatus, bool)> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO verification_statuses
            (id, operator_id, date, shift, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(operator_id.to_string())
    .bind(date)
    .bind(shift.code())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let created = result.rows_affected() > 0;
    let row = find(conn, operator_id, date, shift).await?.ok_or_else(|| {
        qv_common::Error::Internal("Verification row missing after insert".to_string())
    })?;
    Ok((row, created))
}

pub async fn list_by_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<Vec<VerificationStatus>> {
    let sql = format!(
        "SELECT {} FROM verification_statuses WHERE date = ? ORDER BY shift, created_at",
        COLUMNS
    );
    let rows = sqlx::query(&sql).bind(date).fetch_all(&mut *conn).await?;
    rows.iter().map(verification_from_row).collect()
}

/// Approval status of each child record
pub async fn child_statuses(conn: &mut SqliteConnection, id: Uuid) -> Result<ChildStatuses> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT status FROM checklists WHERE verification_id = ?1) AS checklist,
            (SELECT status FROM ftq_records WHERE verification_id = ?1) AS ftq,
            (SELECT status FROM equipment_checks WHERE verification_id = ?1) AS equipment
        "#,
    )
    .bind(id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    let parse = |col: &str| -> Result<Option<ApprovalStatus>> {
        let value: Option<String> = row.get(col);
        value.map(|s| s.parse()).transpose()
    };

    Ok(ChildStatuses {
        checklist: parse("checklist")?,
        ftq: parse("ftq")?,
        equipment: parse("equipment")?,
    })
}

pub async fn update_derived(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: VerificationState,
    notifications: Notifications,
    now: NaiveDateTime,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE verification_statuses
        SET status = ?, notify_supervisor = ?, notify_quality = ?, notify_operator = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(notifications.supervisor)
    .bind(notifications.quality)
    .bind(notifications.operator)
    .bind(now)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
