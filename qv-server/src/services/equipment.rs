//! Equipment checks: error-proofing (EP) and DTPM checkpoint lists
//!
//! Every entry change appends to the check's history; those rows are never
//! rewritten.

use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use qv_common::approval::ApprovalStatus;
use qv_common::models::{
    CheckpointStatus, EquipmentChange, EquipmentCheck, EquipmentCheckKind, RecordType, User,
};
use qv_common::{Error, Result};

use crate::db::{equipment, history, save_approval};
use crate::services::{require_owner, verification};

#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipmentCheck {
    pub verification_id: Uuid,
    pub kind: EquipmentCheckKind,
}

/// Entry change; omitted fields stay unchanged, an empty comment clears it
#[derive(Debug, Clone, Deserialize)]
pub struct EntryUpdate {
    pub status: Option<CheckpointStatus>,
    pub comment: Option<String>,
}

pub async fn create(
    pool: &SqlitePool,
    user: &User,
    request: NewEquipmentCheck,
    now: NaiveDateTime,
) -> Result<EquipmentCheck> {
    let mut tx = pool.begin().await?;
    let verification = verification::load(&mut tx, request.verification_id).await?;
    require_owner(user, &verification)?;
    if equipment::get_by_verification(&mut tx, verification.id)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(
            "This shift record already has an equipment check".to_string(),
        ));
    }

    let check = equipment::insert(&mut tx, verification.id, request.kind, now).await?;
    history::append(
        &mut tx,
        RecordType::EquipmentCheck,
        check.id,
        None,
        ApprovalStatus::Pending.as_str(),
        "create",
        user.id,
        None,
        now,
    )
    .await?;
    verification::refresh(&mut tx, verification.id, now).await?;
    tx.commit().await?;

    info!(
        check = %check.id,
        kind = %check.kind,
        checkpoints = check.entries.len(),
        by = %user.username,
        "Equipment check created"
    );
    Ok(check)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<EquipmentCheck> {
    let mut conn = pool.acquire().await?;
    equipment::get(&mut conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("equipment check {}", id)))
}

pub async fn changes(pool: &SqlitePool, id: Uuid) -> Result<Vec<EquipmentChange>> {
    let mut conn = pool.acquire().await?;
    if equipment::get(&mut conn, id).await?.is_none() {
        return Err(Error::NotFound(format!("equipment check {}", id)));
    }
    equipment::list_changes(&mut conn, id).await
}

/// Change one checkpoint; a rejected check returns to pending
pub async fn update_entry(
    pool: &SqlitePool,
    id: Uuid,
    code: &str,
    user: &User,
    update: EntryUpdate,
    now: NaiveDateTime,
) -> Result<EquipmentCheck> {
    let mut tx = pool.begin().await?;
    let mut check = equipment::get(&mut tx, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("equipment check {}", id)))?;
    let verification = verification::load(&mut tx, check.verification_id).await?;
    require_owner(user, &verification)?;

    let index = check
        .entries
        .iter()
        .position(|e| e.code == code)
        .ok_or_else(|| Error::NotFound(format!("checkpoint {} on check {}", code, id)))?;

    let transition = check.approval.begin_edit()?;

    let entry = &mut check.entries[index];
    let mut changed = 0;
    if let Some(status) = update.status {
        if entry.status != Some(status) {
            equipment::append_change(
                &mut tx,
                id,
                code,
                "status",
                entry.status.map(|s| s.as_str()),
                Some(status.as_str()),
                user.id,
                now,
            )
            .await?;
            entry.status = Some(status);
            changed += 1;
        }
    }
    if let Some(comment) = update.comment {
        let comment = Some(comment.trim().to_string()).filter(|c| !c.is_empty());
        if entry.comment != comment {
            equipment::append_change(
                &mut tx,
                id,
                code,
                "comment",
                entry.comment.as_deref(),
                comment.as_deref(),
                user.id,
                now,
            )
            .await?;
            entry.comment = comment;
            changed += 1;
        }
    }
    if changed == 0 && transition.is_none() {
        // Nothing to write
        tx.rollback().await?;
        return Ok(check);
    }

    equipment::update_entry(&mut tx, id, &check.entries[index]).await?;
    check.updated_at = now;
    match &transition {
        Some(transition) => {
            save_approval(&mut tx, RecordType::EquipmentCheck, id, &check.approval, now).await?;
            history::record_transition(
                &mut tx,
                RecordType::EquipmentCheck,
                id,
                transition,
                user.id,
                None,
                now,
            )
            .await?;
        }
        None => equipment::touch(&mut tx, id, now).await?,
    }
    verification::refresh(&mut tx, verification.id, now).await?;
    tx.commit().await?;

    info!(check = %id, checkpoint = code, changes = changed, "Checkpoint updated");
    Ok(check)
}
