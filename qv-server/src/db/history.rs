//! Approval history (append-only)

use chrono::NaiveDateTime;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::approval::Transition;
use qv_common::models::{HistoryEntry, RecordType};
use qv_common::Result;

use super::parse_uuid;

/// Append one history row
#[allow(clippy::too_many_arguments)]
pub async fn append(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    record_id: Uuid,
    from_status: Option<&str>,
    to_status: &str,
    action: &str,
    actor_id: Uuid,
    comment: Option<&str>,
    at: NaiveDateTime,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO approval_history
            (record_type, record_id, from_status, to_status, action, actor_id, comment, at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record_type.as_str())
    .bind(record_id.to_string())
    .bind(from_status)
    .bind(to_status)
    .bind(action)
    .bind(actor_id.to_string())
    .bind(comment)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Append the row for an applied transition
pub async fn record_transition<S: std::fmt::Display>(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    record_id: Uuid,
    transition: &Transition<S>,
    actor_id: Uuid,
    comment: Option<&str>,
    at: NaiveDateTime,
) -> Result<()> {
    append(
        conn,
        record_type,
        record_id,
        Some(&transition.from.to_string()),
        &transition.to.to_string(),
        transition.action,
        actor_id,
        comment,
        at,
    )
    .await
}

pub async fn list(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    record_id: Uuid,
) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, record_type, record_id, from_status, to_status, action, actor_id, comment, at
        FROM approval_history
        WHERE record_type = ? AND record_id = ?
        ORDER BY id
        "#,
    )
    .bind(record_type.as_str())
    .bind(record_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<HistoryEntry> {
            let record_type: String = row.get("record_type");
            let record_id: String = row.get("record_id");
            let actor_id: String = row.get("actor_id");
            Ok(HistoryEntry {
                id: row.get("id"),
                record_type: record_type.parse()?,
                record_id: parse_uuid(&record_id)?,
                from_status: row.get("from_status"),
                to_status: row.get("to_status"),
                action: row.get("action"),
                actor_id: parse_uuid(&actor_id)?,
                comment: row.get("comment"),
                at: row.get("at"),
            })
        })
        .collect()
}
