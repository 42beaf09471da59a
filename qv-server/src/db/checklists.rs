//! Checklist rows

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::ApprovalState;
use qv_common::models::{Checklist, ChecklistReadings};
use qv_common::{Error, Result};

use super::{approval_from_row, parse_opt_uuid, parse_uuid};

const COLUMNS: &str = "id, verification_id, model, line, machine, shift_start, \
     sampling_config_id, readings, status, supervisor_by, supervisor_at, quality_by, quality_at, \
     rejected_by, rejected_at, rejection_reason, created_at, updated_at";

fn checklist_from_row(row: &SqliteRow) -> Result<Checklist> {
    let id: String = row.get("id");
    let verification_id: String = row.get("verification_id");
    let readings: String = row.get("readings");
    let readings: ChecklistReadings = serde_json::from_str(&readings)
        .map_err(|e| Error::Internal(format!("Failed to deserialize readings: {}", e)))?;

    Ok(Checklist {
        id: parse_uuid(&id)?,
        verification_id: parse_uuid(&verification_id)?,
        model: row.get("model"),
        line: row.get("line"),
        machine: row.get("machine"),
        shift_start: row.get("shift_start"),
        sampling_config_id: parse_opt_uuid(row.get("sampling_config_id"))?,
        readings,
        approval: approval_from_row(row)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn readings_json(readings: &ChecklistReadings) -> Result<String> {
    serde_json::to_string(readings)
        .map_err(|e| Error::Internal(format!("Failed to serialize readings: {}", e)))
}

pub async fn insert(conn: &mut SqliteConnection, checklist: &Checklist) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO checklists
            (id, verification_id, model, line, machine, shift_start, sampling_config_id,
             readings, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(checklist.id.to_string())
    .bind(checklist.verification_id.to_string())
    .bind(&checklist.model)
    .bind(&checklist.line)
    .bind(&checklist.machine)
    .bind(checklist.shift_start)
    .bind(checklist.sampling_config_id.map(|id| id.to_string()))
    .bind(readings_json(&checklist.readings)?)
    .bind(checklist.approval.status.as_str())
    .bind(checklist.created_at)
    .bind(checklist.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Checklist>> {
    let sql = format!("SELECT {} FROM checklists WHERE id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(checklist_from_row).transpose()
}

pub async fn get_by_verification(
    conn: &mut SqliteConnection,
    verification_id: Uuid,
) -> Result<Option<Checklist>> {
    let sql = format!("SELECT {} FROM checklists WHERE verification_id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(verification_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(checklist_from_row).transpose()
}

/// Store edited header fields and readings
pub async fn update_contents(conn: &mut SqliteConnection, checklist: &Checklist) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE checklists
        SET model = ?, line = ?, machine = ?, readings = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&checklist.model)
    .bind(&checklist.line)
    .bind(&checklist.machine)
    .bind(readings_json(&checklist.readings)?)
    .bind(checklist.updated_at)
    .bind(checklist.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn attach_sampling_config(
    conn: &mut SqliteConnection,
    id: Uuid,
    config_id: Uuid,
) -> Result<()> {
    sqlx::query("UPDATE checklists SET sampling_config_id = ? WHERE id = ?")
        .bind(config_id.to_string())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Checklist joined with its verification row, for reports and export
#[derive(Debug, Clone)]
pub struct ChecklistListing {
    pub checklist: Checklist,
    pub date: NaiveDate,
    pub shift: String,
    pub operator: String,
    pub subgroup_count: i64,
}

/// Checklists whose shift date lies in `[from, to]`
pub async fn list_in_range(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ChecklistListing>> {
    let columns: Vec<String> = COLUMNS.split(", ").map(|c| format!("c.{}", c.trim())).collect();
    let sql = format!(
        r#"
        SELECT {}, v.date AS v_date, v.shift AS v_shift, u.display_name AS operator,
               (SELECT COUNT(*) FROM subgroups s WHERE s.checklist_id = c.id) AS subgroup_count
        FROM checklists c
        JOIN verification_statuses v ON v.id = c.verification_id
        JOIN users u ON u.id = v.operator_id
        WHERE v.date BETWEEN ? AND ?
        ORDER BY v.date, v.shift, c.line, c.machine
        "#,
        columns.join(", ")
    );

    let rows = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| -> Result<ChecklistListing> {
            Ok(ChecklistListing {
                checklist: checklist_from_row(row)?,
                date: row.get("v_date"),
                shift: row.get("v_shift"),
                operator: row.get("operator"),
                subgroup_count: row.get("subgroup_count"),
            })
        })
        .collect()
}

/// Fresh pending checklist
pub fn new_checklist(
    verification_id: Uuid,
    model: String,
    line: String,
    machine: String,
    shift_start: NaiveDateTime,
    readings: ChecklistReadings,
    now: NaiveDateTime,
) -> Checklist {
    Checklist {
        id: Uuid::new_v4(),
        verification_id,
        model,
        line,
        machine,
        shift_start,
        sampling_config_id: None,
        readings,
        approval: ApprovalState::default(),
        created_at: now,
        updated_at: now,
    }
}
