//! Equipment checks (EP / DTPM), their checkpoint entries and change history

use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::ApprovalState;
use qv_common::models::{CheckpointEntry, EquipmentChange, EquipmentCheck, EquipmentCheckKind};
use qv_common::Result;

use super::{approval_from_row, parse_uuid};

const COLUMNS: &str = "id, verification_id, kind, status, supervisor_by, supervisor_at, \
     quality_by, quality_at, rejected_by, rejected_at, rejection_reason, created_at, updated_at";

fn check_from_row(row: &SqliteRow, entries: Vec<CheckpointEntry>) -> Result<EquipmentCheck> {
    let id: String = row.get("id");
    let verification_id: String = row.get("verification_id");
    let kind: String = row.get("kind");

    Ok(EquipmentCheck {
        id: parse_uuid(&id)?,
        verification_id: parse_uuid(&verification_id)?,
        kind: kind.parse()?,
        entries,
        approval: approval_from_row(row)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Create a check with every catalogue checkpoint unanswered
pub async fn insert(
    conn: &mut SqliteConnection,
    verification_id: Uuid,
    kind: EquipmentCheckKind,
    now: NaiveDateTime,
) -> Result<EquipmentCheck> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO equipment_checks (id, verification_id, kind, status, created_at, updated_at)
        VALUES (?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(verification_id.to_string())
    .bind(kind.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let mut entries = Vec::with_capacity(kind.catalogue().len());
    for (position, (code, description)) in kind.catalogue().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO equipment_check_entries (check_id, code, position, description)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(*code)
        .bind(position as i64)
        .bind(*description)
        .execute(&mut *conn)
        .await?;

        entries.push(CheckpointEntry {
            code: code.to_string(),
            description: description.to_string(),
            status: None,
            comment: None,
        });
    }

    Ok(EquipmentCheck {
        id,
        verification_id,
        kind,
        entries,
        approval: ApprovalState::default(),
        created_at: now,
        updated_at: now,
    })
}

async fn entries(conn: &mut SqliteConnection, check_id: &str) -> Result<Vec<CheckpointEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT code, description, status, comment
        FROM equipment_check_entries
        WHERE check_id = ?
        ORDER BY position
        "#,
    )
    .bind(check_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<CheckpointEntry> {
            let status: Option<String> = row.get("status");
            Ok(CheckpointEntry {
                code: row.get("code"),
                description: row.get("description"),
                status: status.map(|s| s.parse()).transpose()?,
                comment: row.get("comment"),
            })
        })
        .collect()
}

async fn load_where(
    conn: &mut SqliteConnection,
    column: &str,
    value: Uuid,
) -> Result<Option<EquipmentCheck>> {
    let sql = format!("SELECT {} FROM equipment_checks WHERE {} = ?", COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let entries = entries(conn, &id).await?;
            Ok(Some(check_from_row(&row, entries)?))
        }
        None => Ok(None),
    }
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<EquipmentCheck>> {
    load_where(conn, "id", id).await
}

pub async fn get_by_verification(
    conn: &mut SqliteConnection,
    verification_id: Uuid,
) -> Result<Option<EquipmentCheck>> {
    load_where(conn, "verification_id", verification_id).await
}

pub async fn update_entry(
    conn: &mut SqliteConnection,
    check_id: Uuid,
    entry: &CheckpointEntry,
) -> Result<()> {
    sqlx::query(
        "UPDATE equipment_check_entries SET status = ?, comment = ? WHERE check_id = ? AND code = ?",
    )
    .bind(entry.status.map(|s| s.as_str()))
    .bind(entry.comment.as_deref())
    .bind(check_id.to_string())
    .bind(&entry.code)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn touch(conn: &mut SqliteConnection, check_id: Uuid, now: NaiveDateTime) -> Result<()> {
    sqlx::query("UPDATE equipment_checks SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(check_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Append one change row to the history
#[allow(clippy::too_many_arguments)]
pub async fn append_change(
    conn: &mut SqliteConnection,
    check_id: Uuid,
    checkpoint_code: &str,
    field: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    changed_by: Uuid,
    changed_at: NaiveDateTime,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO equipment_check_history
            (check_id, checkpoint_code, field, old_value, new_value, changed_by, changed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(check_id.to_string())
    .bind(checkpoint_code)
    .bind(field)
    .bind(old_value)
    .bind(new_value)
    .bind(changed_by.to_string())
    .bind(changed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list_changes(conn: &mut SqliteConnection, check_id: Uuid) -> Result<Vec<EquipmentChange>> {
    let rows = sqlx::query(
        r#"
        SELECT id, check_id, checkpoint_code, field, old_value, new_value, changed_by, changed_at
        FROM equipment_check_history
        WHERE check_id = ?
        ORDER BY id
        "#,
    )
    .bind(check_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<EquipmentChange> {
            let check_id: String = row.get("check_id");
            let changed_by: String = row.get("changed_by");
            Ok(EquipmentChange {
                id: row.get("id"),
                check_id: parse_uuid(&check_id)?,
                checkpoint_code: row.get("checkpoint_code"),
                field: row.get("field"),
                old_value: row.get("old_value"),
                new_value: row.get("new_value"),
                changed_by: parse_uuid(&changed_by)?,
                changed_at: row.get("changed_at"),
            })
        })
        .collect()
}
