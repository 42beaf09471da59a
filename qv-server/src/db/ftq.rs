//! First Time Quality records and their defect lines

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::ApprovalState;
use qv_common::models::{DefectRecord, FtqRecord};
use qv_common::shift::Shift;
use qv_common::Result;

use super::{approval_from_row, parse_uuid};

const COLUMNS: &str = "id, verification_id, date, shift, model, total_inspected, total_defects, \
     status, supervisor_by, supervisor_at, quality_by, quality_at, rejected_by, rejected_at, \
     rejection_reason, created_at, updated_at";

fn record_from_row(row: &SqliteRow) -> Result<FtqRecord> {
    let id: String = row.get("id");
    let verification_id: String = row.get("verification_id");
    let shift: String = row.get("shift");

    Ok(FtqRecord {
        id: parse_uuid(&id)?,
        verification_id: parse_uuid(&verification_id)?,
        date: row.get("date"),
        shift: shift.parse()?,
        model: row.get("model"),
        total_inspected: row.get("total_inspected"),
        total_defects: row.get("total_defects"),
        approval: approval_from_row(row)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn defect_from_row(row: &SqliteRow) -> Result<DefectRecord> {
    let id: String = row.get("id");
    let ftq_id: String = row.get("ftq_id");
    Ok(DefectRecord {
        id: parse_uuid(&id)?,
        ftq_id: parse_uuid(&ftq_id)?,
        operation: row.get("operation"),
        defect_type: row.get("defect_type"),
        count: row.get("count"),
        created_at: row.get("created_at"),
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    verification_id: Uuid,
    date: NaiveDate,
    shift: Shift,
    model: &str,
    total_inspected: i64,
    now: NaiveDateTime,
) -> Result<FtqRecord> {
    let record = FtqRecord {
        id: Uuid::new_v4(),
        verification_id,
        date,
        shift,
        model: model.to_string(),
        total_inspected,
        total_defects: 0,
        approval: ApprovalState::default(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO ftq_records
            (id, verification_id, date, shift, model, total_inspected, total_defects,
             status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, 'pending', ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(verification_id.to_string())
    .bind(date)
    .bind(shift.code())
    .bind(&record.model)
    .bind(total_inspected)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<FtqRecord>> {
    let sql = format!("SELECT {} FROM ftq_records WHERE id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

pub async fn get_by_verification(
    conn: &mut SqliteConnection,
    verification_id: Uuid,
) -> Result<Option<FtqRecord>> {
    let sql = format!("SELECT {} FROM ftq_records WHERE verification_id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(verification_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

pub async fn update_header(
    conn: &mut SqliteConnection,
    id: Uuid,
    model: &str,
    total_inspected: i64,
    now: NaiveDateTime,
) -> Result<()> {
    sqlx::query(
        "UPDATE ftq_records SET model = ?, total_inspected = ?, updated_at = ? WHERE id = ?",
    )
    .bind(model)
    .bind(total_inspected)
    .bind(now)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Set `total_defects` to the sum of the record's defect counts
pub async fn recompute_total(
    conn: &mut SqliteConnection,
    id: Uuid,
    now: NaiveDateTime,
) -> Result<i64> {
    sqlx::query(
        r#"
        UPDATE ftq_records
        SET total_defects = (SELECT COALESCE(SUM(count), 0) FROM defect_records WHERE ftq_id = ?1),
            updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(id.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT total_defects FROM ftq_records WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;

    Ok(total)
}

pub async fn list_defects(conn: &mut SqliteConnection, ftq_id: Uuid) -> Result<Vec<DefectRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, ftq_id, operation, defect_type, count, created_at
        FROM defect_records
        WHERE ftq_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(ftq_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(defect_from_row).collect()
}

pub async fn get_defect(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<DefectRecord>> {
    let row = sqlx::query(
        "SELECT id, ftq_id, operation, defect_type, count, created_at FROM defect_records WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(defect_from_row).transpose()
}

pub async fn insert_defect(
    conn: &mut SqliteConnection,
    ftq_id: Uuid,
    operation: &str,
    defect_type: &str,
    count: i64,
    now: NaiveDateTime,
) -> Result<DefectRecord> {
    let defect = DefectRecord {
        id: Uuid::new_v4(),
        ftq_id,
        operation: operation.to_string(),
        defect_type: defect_type.to_string(),
        count,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO defect_records (id, ftq_id, operation, defect_type, count, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(defect.id.to_string())
    .bind(ftq_id.to_string())
    .bind(operation)
    .bind(defect_type)
    .bind(count)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(defect)
}

pub async fn update_defect_count(conn: &mut SqliteConnection, id: Uuid, count: i64) -> Result<()> {
    sqlx::query("UPDATE defect_records SET count = ? WHERE id = ?")
        .bind(count)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn delete_defect(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM defect_records WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// FTQ records whose shift date lies in `[from, to]`
pub async fn list_in_range(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<FtqRecord>> {
    let sql = format!(
        "SELECT {} FROM ftq_records WHERE date BETWEEN ? AND ? ORDER BY date, shift, model",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(record_from_row).collect()
}
