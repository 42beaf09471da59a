//! Subgroup measurement batches

use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::SubgroupVerification;
use qv_common::models::{RecordType, Subgroup};
use qv_common::{Error, Result};

use super::{parse_uuid, save_signoffs, signoffs_from_row, SignoffColumns};

const COLUMNS: &str = "id, checklist_id, sequence, recorded_at, readings, status, \
     supervisor_by, supervisor_at, quality_by, quality_at, rejected_by, rejected_at, rejection_reason";

fn subgroup_from_row(row: &SqliteRow) -> Result<Subgroup> {
    let id: String = row.get("id");
    let checklist_id: String = row.get("checklist_id");
    let sequence: i64 = row.get("sequence");
    let readings: String = row.get("readings");
    let readings: Vec<f64> = serde_json::from_str(&readings)
        .map_err(|e| Error::Internal(format!("Failed to deserialize subgroup readings: {}", e)))?;
    let status: String = row.get("status");
    let columns = signoffs_from_row(row)?;

    Ok(Subgroup {
        id: parse_uuid(&id)?,
        checklist_id: parse_uuid(&checklist_id)?,
        sequence: u32::try_from(sequence)
            .map_err(|_| Error::Internal(format!("Invalid subgroup sequence {}", sequence)))?,
        recorded_at: row.get("recorded_at"),
        readings,
        verification: SubgroupVerification {
            status: status.parse()?,
            supervisor: columns.supervisor,
            quality: columns.quality,
            rejection: columns.rejection,
        },
    })
}

fn readings_json(readings: &[f64]) -> Result<String> {
    serde_json::to_string(readings)
        .map_err(|e| Error::Internal(format!("Failed to serialize subgroup readings: {}", e)))
}

pub async fn count(conn: &mut SqliteConnection, checklist_id: Uuid) -> Result<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subgroups WHERE checklist_id = ?")
        .bind(checklist_id.to_string())
        .fetch_one(&mut *conn)
        .await?;

    Ok(count as u32)
}

pub async fn list(conn: &mut SqliteConnection, checklist_id: Uuid) -> Result<Vec<Subgroup>> {
    let sql = format!(
        "SELECT {} FROM subgroups WHERE checklist_id = ? ORDER BY sequence",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(checklist_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(subgroup_from_row).collect()
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Subgroup>> {
    let sql = format!("SELECT {} FROM subgroups WHERE id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(subgroup_from_row).transpose()
}

pub async fn insert(
    conn: &mut SqliteConnection,
    checklist_id: Uuid,
    sequence: u32,
    readings: Vec<f64>,
    recorded_at: NaiveDateTime,
) -> Result<Subgroup> {
    let subgroup = Subgroup {
        id: Uuid::new_v4(),
        checklist_id,
        sequence,
        recorded_at,
        readings,
        verification: SubgroupVerification::default(),
    };

    sqlx::query(
        r#"
        INSERT INTO subgroups (id, checklist_id, sequence, recorded_at, readings, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subgroup.id.to_string())
    .bind(checklist_id.to_string())
    .bind(sequence as i64)
    .bind(recorded_at)
    .bind(readings_json(&subgroup.readings)?)
    .bind(subgroup.verification.status.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(subgroup)
}

pub async fn update_readings(
    conn: &mut SqliteConnection,
    id: Uuid,
    readings: &[f64],
) -> Result<()> {
    sqlx::query("UPDATE subgroups SET readings = ? WHERE id = ?")
        .bind(readings_json(readings)?)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn save_verification(
    conn: &mut SqliteConnection,
    id: Uuid,
    verification: &SubgroupVerification,
) -> Result<()> {
    let columns = SignoffColumns {
        supervisor: verification.supervisor.clone(),
        quality: verification.quality.clone(),
        rejection: verification.rejection.clone(),
    };
    save_signoffs(
        conn,
        RecordType::Subgroup,
        id,
        verification.status.as_str(),
        &columns,
        None,
    )
    .await
}
