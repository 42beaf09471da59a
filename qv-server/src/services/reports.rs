//! Report aggregation over a date range

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use qv_common::approval::ApprovalStatus;
use qv_common::models::{ftq_percent, VerificationState};
use qv_common::{Error, Result};

use crate::db::{checklists, ftq, verifications};

/// Report grouping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Model,
    Shift,
    Date,
}

/// Checklist outcome counts for one group
///
/// `approved` counts quality-approved checklists; everything neither
/// approved nor rejected is `pending`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistSummaryRow {
    pub key: String,
    pub total: u32,
    pub approved: u32,
    pub rejected: u32,
    pub pending: u32,
    pub approved_pct: f64,
    pub rejected_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FtqSummaryRow {
    pub key: String,
    pub inspected: i64,
    pub defects: i64,
    pub ftq_percent: Option<f64>,
}

/// Shift records of one day by state, plus who has work waiting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub total: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub rejected: u32,
    pub awaiting_supervisor: u32,
    pub awaiting_quality: u32,
    pub awaiting_operator: u32,
}

/// Percentage rounded to one decimal
fn percent(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(Error::InvalidInput(format!(
            "Report range starts after it ends ({} > {})",
            from, to
        )));
    }
    Ok(())
}

fn group_key(group_by: GroupBy, model: &str, shift: &str, date: NaiveDate) -> String {
    match group_by {
        GroupBy::Model => model.to_string(),
        GroupBy::Shift => shift.to_string(),
        GroupBy::Date => date.to_string(),
    }
}

pub async fn checklist_summary(
    pool: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
    group_by: GroupBy,
) -> Result<Vec<ChecklistSummaryRow>> {
    check_range(from, to)?;
    let mut conn = pool.acquire().await?;
    let listings = checklists::list_in_range(&mut conn, from, to).await?;

    let mut groups: BTreeMap<String, (u32, u32, u32)> = BTreeMap::new();
    for listing in &listings {
        let key = group_key(
            group_by,
            &listing.checklist.model,
            &listing.shift,
            listing.date,
        );
        let counts = groups.entry(key).or_default();
        counts.0 += 1;
        match listing.checklist.approval.status {
            ApprovalStatus::QualityApproved => counts.1 += 1,
            ApprovalStatus::Rejected => counts.2 += 1,
            ApprovalStatus::Pending | ApprovalStatus::SupervisorApproved => {}
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, (total, approved, rejected))| ChecklistSummaryRow {
            key,
            total,
            approved,
            rejected,
            pending: total - approved - rejected,
            approved_pct: percent(approved, total),
            rejected_pct: percent(rejected, total),
        })
        .collect())
}

pub async fn ftq_summary(
    pool: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
    group_by: GroupBy,
) -> Result<Vec<FtqSummaryRow>> {
    check_range(from, to)?;
    let mut conn = pool.acquire().await?;
    let records = ftq::list_in_range(&mut conn, from, to).await?;

    let mut groups: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for record in &records {
        let key = group_key(group_by, &record.model, record.shift.code(), record.date);
        let totals = groups.entry(key).or_default();
        totals.0 += record.total_inspected;
        totals.1 += record.total_defects;
    }

    Ok(groups
        .into_iter()
        .map(|(key, (inspected, defects))| FtqSummaryRow {
            key,
            inspected,
            defects,
            ftq_percent: ftq_percent(inspected, defects),
        })
        .collect())
}

pub async fn dashboard(pool: &SqlitePool, date: NaiveDate) -> Result<Dashboard> {
    let mut conn = pool.acquire().await?;
    let records = verifications::list_by_date(&mut conn, date).await?;

    let mut dashboard = Dashboard {
        date,
        ..Dashboard::default()
    };
    for record in &records {
        dashboard.total += 1;
        match record.status {
            VerificationState::Pending => dashboard.pending += 1,
            VerificationState::InProgress => dashboard.in_progress += 1,
            VerificationState::Completed => dashboard.completed += 1,
            VerificationState::Rejected => dashboard.rejected += 1,
        }
        dashboard.awaiting_supervisor += record.notifications.supervisor as u32;
        dashboard.awaiting_quality += record.notifications.quality as u32;
        dashboard.awaiting_operator += record.notifications.operator as u32;
    }
    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(4, 4), 100.0);
    }

    #[test]
    fn test_range_order() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(check_range(day, day).is_ok());
        assert!(check_range(day.succ_opt().unwrap(), day).is_err());
    }

    #[test]
    fn test_group_key() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(group_key(GroupBy::Model, "VX-200", "A", day), "VX-200");
        assert_eq!(group_key(GroupBy::Shift, "VX-200", "A", day), "A");
        assert_eq!(group_key(GroupBy::Date, "VX-200", "A", day), "2024-03-04");
    }
}
