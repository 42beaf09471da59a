//! Workflow services
//!
//! Each mutating operation runs inside one database transaction: the record
//! change, its approval history rows and the refreshed verification status
//! commit together or not at all.

pub mod checklist;
pub mod equipment;
pub mod export;
pub mod ftq;
pub mod reports;
pub mod review;
pub mod subgroup;
pub mod verification;

use qv_common::approval::ApprovalAction;
use qv_common::models::{Role, User, VerificationStatus};
use qv_common::{Error, Result};

/// Only the operator who owns the shift record (or an admin) may change it
pub(crate) fn require_owner(user: &User, verification: &VerificationStatus) -> Result<()> {
    if user.id == verification.operator_id || user.role == Role::Admin {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "{} does not own this shift record",
            user.username
        )))
    }
}

/// Role check for a review action
pub(crate) fn authorize_review(user: &User, action: ApprovalAction) -> Result<()> {
    let allowed = match action {
        ApprovalAction::SupervisorApprove => user.role.can_supervise(),
        ApprovalAction::QualityApprove => user.role.can_quality_review(),
        ApprovalAction::Reject => user.role.can_reject(),
        ApprovalAction::Resubmit => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Role {} may not {}",
            user.role,
            action.as_str()
        )))
    }
}

/// Rejections must carry a reason for the operator
pub(crate) fn require_reason(reason: Option<&str>) -> Result<&str> {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(reason),
        _ => Err(Error::InvalidInput(
            "A rejection reason is required".to_string(),
        )),
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::InvalidInput(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use qv_common::models::{Notifications, VerificationState};
    use qv_common::shift::Shift;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("{}-user", role),
            display_name: "Test".to_string(),
            role,
            active: true,
            created_at: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_review_roles() {
        let operator = user(Role::Operator);
        let supervisor = user(Role::ShiftSupervisor);
        let quality = user(Role::QualitySupervisor);

        assert!(authorize_review(&supervisor, ApprovalAction::SupervisorApprove).is_ok());
        assert!(authorize_review(&supervisor, ApprovalAction::QualityApprove).is_err());
        assert!(authorize_review(&quality, ApprovalAction::QualityApprove).is_ok());
        assert!(authorize_review(&quality, ApprovalAction::Reject).is_ok());
        assert!(matches!(
            authorize_review(&operator, ApprovalAction::Reject),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_owner_check() {
        let operator = user(Role::Operator);
        let other = user(Role::Operator);
        let admin = user(Role::Admin);
        let verification = VerificationStatus {
            id: Uuid::new_v4(),
            operator_id: operator.id,
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            shift: Shift::A,
            status: VerificationState::Pending,
            notifications: Notifications::default(),
            created_at: operator.created_at,
            updated_at: operator.created_at,
        };

        assert!(require_owner(&operator, &verification).is_ok());
        assert!(require_owner(&admin, &verification).is_ok());
        assert!(require_owner(&other, &verification).is_err());
    }

    #[test]
    fn test_reason_required() {
        assert!(require_reason(None).is_err());
        assert!(require_reason(Some("   ")).is_err());
        assert_eq!(require_reason(Some(" leak ")).unwrap(), "leak");
    }
}
