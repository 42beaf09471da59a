//! Verification status: the per-operator, per-shift aggregate

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use qv_common::db::settings::get_shift_pattern;
use qv_common::models::{Checklist, EquipmentCheck, FtqRecord, User, VerificationStatus};
use qv_common::shift::CurrentShift;
use qv_common::{Error, Result};

use crate::db::{checklists, equipment, ftq, verifications};

/// Shift record with whatever child records exist
#[derive(Debug, Clone, Serialize)]
pub struct VerificationDetail {
    #[serde(flatten)]
    pub verification: VerificationStatus,
    pub checklist: Option<Checklist>,
    pub equipment_check: Option<EquipmentCheck>,
    pub ftq: Option<FtqRecord>,
}

/// Get or create the caller's record for the shift running at `now`
pub async fn open_current(
    pool: &SqlitePool,
    user: &User,
    now: NaiveDateTime,
) -> Result<(VerificationStatus, bool)> {
    let pattern = get_shift_pattern(pool).await?;
    let current = CurrentShift::at(pattern, now);

    let mut conn = pool.acquire().await?;
    let (verification, created) =
        verifications::get_or_create(&mut conn, user.id, current.date, current.shift, now).await?;

    if created {
        info!(
            operator = %user.username,
            date = %current.date,
            shift = %current.shift,
            "Opened shift record"
        );
    }
    Ok((verification, created))
}

pub(crate) async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<VerificationStatus> {
    verifications::get(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("verification {}", id)))
}

pub async fn detail(pool: &SqlitePool, id: Uuid) -> Result<VerificationDetail> {
    let mut conn = pool.acquire().await?;
    let verification = load(&mut conn, id).await?;

    Ok(VerificationDetail {
        checklist: checklists::get_by_verification(&mut conn, id).await?,
        equipment_check: equipment::get_by_verification(&mut conn, id).await?,
        ftq: ftq::get_by_verification(&mut conn, id).await?,
        verification,
    })
}

pub async fn list_by_date(pool: &SqlitePool, date: NaiveDate) -> Result<Vec<VerificationStatus>> {
    let mut conn = pool.acquire().await?;
    verifications::list_by_date(&mut conn, date).await
}

/// Recompute the aggregate status and notification flags from the children
pub(crate) async fn refresh(
    conn: &mut SqliteConnection,
    id: Uuid,
    now: NaiveDateTime,
) -> Result<VerificationStatus> {
    let children = verifications::child_statuses(conn, id).await?;
    let status = children.state();
    let notifications = children.notifications();

    verifications::update_derived(conn, id, status, notifications, now).await?;
    debug!(verification = %id, status = %status, "Refreshed verification status");

    load(conn, id).await
}
