//! Approval state machines
//!
//! Checklists, equipment checks (EP and DTPM) and FTQ records share one
//! three-stage review flow:
//!
//! ```text
//! Pending --supervisor_approve--> SupervisorApproved --quality_approve--> QualityApproved
//!    |                                   |
//!    +-------------reject----------------+--> Rejected --resubmit--> Pending
//! ```
//!
//! Subgroups run a parallel verification flow and become immutable once
//! quality-verified.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::Error;

/// Rejected transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a record that is {from}")]
    NotAllowed {
        from: &'static str,
        action: &'static str,
    },

    #[error("record is locked after quality verification")]
    Locked,
}

/// Review status of a checklist, equipment check or FTQ record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    SupervisorApproved,
    QualityApproved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::SupervisorApproved => "supervisor_approved",
            ApprovalStatus::QualityApproved => "quality_approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ApprovalStatus::QualityApproved)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "supervisor_approved" => Ok(ApprovalStatus::SupervisorApproved),
            "quality_approved" => Ok(ApprovalStatus::QualityApproved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(Error::Internal(format!("Unknown approval status: {}", other))),
        }
    }
}

/// Review step applied to an [`ApprovalState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    SupervisorApprove,
    QualityApprove,
    Reject,
    Resubmit,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::SupervisorApprove => "supervisor_approve",
            ApprovalAction::QualityApprove => "quality_approve",
            ApprovalAction::Reject => "reject",
            ApprovalAction::Resubmit => "resubmit",
        }
    }
}

/// Transition table; `None` when the action is not allowed from `from`
pub fn next_status(from: ApprovalStatus, action: ApprovalAction) -> Option<ApprovalStatus> {
    use ApprovalAction::*;
    use ApprovalStatus::*;

    match (from, action) {
        (Pending, SupervisorApprove) => Some(SupervisorApproved),
        (SupervisorApproved, QualityApprove) => Some(QualityApproved),
        (Pending | SupervisorApproved, Reject) => Some(Rejected),
        (Rejected, Resubmit) => Some(Pending),
        _ => None,
    }
}

/// Who signed a stage and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signoff {
    pub by: Uuid,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub by: Uuid,
    pub at: NaiveDateTime,
    pub reason: String,
}

/// Applied status change, recorded in approval history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
    pub action: &'static str,
}

/// Review state carried by checklists, equipment checks and FTQ records
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApprovalState {
    pub status: ApprovalStatus,
    pub supervisor: Option<Signoff>,
    pub quality: Option<Signoff>,
    pub rejection: Option<Rejection>,
}

impl ApprovalState {
    fn step(&mut self, action: ApprovalAction) -> Result<Transition<ApprovalStatus>, TransitionError> {
        let from = self.status;
        let to = next_status(from, action).ok_or(TransitionError::NotAllowed {
            from: from.as_str(),
            action: action.as_str(),
        })?;
        self.status = to;
        Ok(Transition {
            from,
            to,
            action: action.as_str(),
        })
    }

    pub fn supervisor_approve(
        &mut self,
        by: Uuid,
        at: NaiveDateTime,
    ) -> Result<Transition<ApprovalStatus>, TransitionError> {
        let transition = self.step(ApprovalAction::SupervisorApprove)?;
        self.supervisor = Some(Signoff { by, at });
        Ok(transition)
    }

    pub fn quality_approve(
        &mut self,
        by: Uuid,
        at: NaiveDateTime,
    ) -> Result<Transition<ApprovalStatus>, TransitionError> {
        let transition = self.step(ApprovalAction::QualityApprove)?;
        self.quality = Some(Signoff { by, at });
        Ok(transition)
    }

    /// Reject the record, dropping every downstream signoff
    pub fn reject(
        &mut self,
        by: Uuid,
        at: NaiveDateTime,
        reason: impl Into<String>,
    ) -> Result<Transition<ApprovalStatus>, TransitionError> {
        let transition = self.step(ApprovalAction::Reject)?;
        self.supervisor = None;
        self.quality = None;
        self.rejection = Some(Rejection {
            by,
            at,
            reason: reason.into(),
        });
        Ok(transition)
    }

    pub fn resubmit(&mut self) -> Result<Transition<ApprovalStatus>, TransitionError> {
        let transition = self.step(ApprovalAction::Resubmit)?;
        self.rejection = None;
        Ok(transition)
    }

    /// Apply a review action by `actor`; `reason` is only used by reject
    pub fn apply(
        &mut self,
        action: ApprovalAction,
        actor: Uuid,
        at: NaiveDateTime,
        reason: Option<&str>,
    ) -> Result<Transition<ApprovalStatus>, TransitionError> {
        match action {
            ApprovalAction::SupervisorApprove => self.supervisor_approve(actor, at),
            ApprovalAction::QualityApprove => self.quality_approve(actor, at),
            ApprovalAction::Reject => self.reject(actor, at, reason.unwrap_or_default()),
            ApprovalAction::Resubmit => self.resubmit(),
        }
    }

    /// Check that the owner may edit the record
    ///
    /// Editing a rejected record is its resubmission and returns the
    /// resulting transition. Records under review cannot be edited.
    pub fn begin_edit(&mut self) -> Result<Option<Transition<ApprovalStatus>>, TransitionError> {
        match self.status {
            ApprovalStatus::Pending => Ok(None),
            ApprovalStatus::Rejected => self.resubmit().map(Some),
            ApprovalStatus::QualityApproved => Err(TransitionError::Locked),
            ApprovalStatus::SupervisorApproved => Err(TransitionError::NotAllowed {
                from: ApprovalStatus::SupervisorApproved.as_str(),
                action: "edit",
            }),
        }
    }
}

/// Verification status of one subgroup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgroupStatus {
    #[default]
    Pending,
    SupervisorVerified,
    QualityVerified,
    Rejected,
}

impl SubgroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubgroupStatus::Pending => "pending",
            SubgroupStatus::SupervisorVerified => "supervisor_verified",
            SubgroupStatus::QualityVerified => "quality_verified",
            SubgroupStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubgroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubgroupStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubgroupStatus::Pending),
            "supervisor_verified" => Ok(SubgroupStatus::SupervisorVerified),
            "quality_verified" => Ok(SubgroupStatus::QualityVerified),
            "rejected" => Ok(SubgroupStatus::Rejected),
            other => Err(Error::Internal(format!("Unknown subgroup status: {}", other))),
        }
    }
}

/// Verification state carried by a subgroup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubgroupVerification {
    pub status: SubgroupStatus,
    pub supervisor: Option<Signoff>,
    pub quality: Option<Signoff>,
    pub rejection: Option<Rejection>,
}

impl SubgroupVerification {
    fn not_allowed(&self, action: &'static str) -> TransitionError {
        if self.status == SubgroupStatus::QualityVerified {
            TransitionError::Locked
        } else {
            TransitionError::NotAllowed {
                from: self.status.as_str(),
                action,
            }
        }
    }

    fn moved(&mut self, to: SubgroupStatus, action: &'static str) -> Transition<SubgroupStatus> {
        let from = self.status;
        self.status = to;
        Transition { from, to, action }
    }

    pub fn supervisor_verify(
        &mut self,
        by: Uuid,
        at: NaiveDateTime,
    ) -> Result<Transition<SubgroupStatus>, TransitionError> {
        if self.status != SubgroupStatus::Pending {
            return Err(self.not_allowed("supervisor_verify"));
        }
        self.supervisor = Some(Signoff { by, at });
        Ok(self.moved(SubgroupStatus::SupervisorVerified, "supervisor_verify"))
    }

    pub fn quality_verify(
        &mut self,
        by: Uuid,
        at: NaiveDateTime,
    ) -> Result<Transition<SubgroupStatus>, TransitionError> {
        if self.status != SubgroupStatus::SupervisorVerified {
            return Err(self.not_allowed("quality_verify"));
        }
        self.quality = Some(Signoff { by, at });
        Ok(self.moved(SubgroupStatus::QualityVerified, "quality_verify"))
    }

    pub fn reject(
        &mut self,
        by: Uuid,
        at: NaiveDateTime,
        reason: impl Into<String>,
    ) -> Result<Transition<SubgroupStatus>, TransitionError> {
        match self.status {
            SubgroupStatus::Pending | SubgroupStatus::SupervisorVerified => {
                self.supervisor = None;
                self.rejection = Some(Rejection {
                    by,
                    at,
                    reason: reason.into(),
                });
                Ok(self.moved(SubgroupStatus::Rejected, "reject"))
            }
            _ => Err(self.not_allowed("reject")),
        }
    }

    /// Check that the readings may change
    ///
    /// Any edit sends the subgroup back to pending for re-verification.
    pub fn begin_edit(&mut self) -> Result<Option<Transition<SubgroupStatus>>, TransitionError> {
        match self.status {
            SubgroupStatus::Pending => Ok(None),
            SubgroupStatus::QualityVerified => Err(TransitionError::Locked),
            SubgroupStatus::SupervisorVerified | SubgroupStatus::Rejected => {
                self.supervisor = None;
                self.rejection = None;
                Ok(Some(self.moved(SubgroupStatus::Pending, "resubmit")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_full_approval_path() {
        let sup = Uuid::new_v4();
        let qa = Uuid::new_v4();
        let mut state = ApprovalState::default();

        let t = state.supervisor_approve(sup, at(9)).unwrap();
        assert_eq!(t.from, ApprovalStatus::Pending);
        assert_eq!(t.to, ApprovalStatus::SupervisorApproved);

        let t = state.quality_approve(qa, at(10)).unwrap();
        assert_eq!(t.to, ApprovalStatus::QualityApproved);
        assert_eq!(state.supervisor.as_ref().unwrap().by, sup);
        assert_eq!(state.quality.as_ref().unwrap().by, qa);
    }

    #[test]
    fn test_quality_approval_requires_supervisor_first() {
        let mut state = ApprovalState::default();
        let err = state.quality_approve(Uuid::new_v4(), at(9)).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAllowed {
                from: "pending",
                action: "quality_approve"
            }
        );
        assert_eq!(state.status, ApprovalStatus::Pending);
        assert!(state.quality.is_none());
    }

    #[test]
    fn test_quality_approved_only_reachable_from_supervisor_approved() {
        let all = [
            ApprovalStatus::Pending,
            ApprovalStatus::SupervisorApproved,
            ApprovalStatus::QualityApproved,
            ApprovalStatus::Rejected,
        ];
        let actions = [
            ApprovalAction::SupervisorApprove,
            ApprovalAction::QualityApprove,
            ApprovalAction::Reject,
            ApprovalAction::Resubmit,
        ];
        for from in all {
            for action in actions {
                if next_status(from, action) == Some(ApprovalStatus::QualityApproved) {
                    assert_eq!(from, ApprovalStatus::SupervisorApproved);
                }
            }
        }
    }

    #[test]
    fn test_reject_clears_signoffs_and_resubmit_returns_to_pending() {
        let mut state = ApprovalState::default();
        state.supervisor_approve(Uuid::new_v4(), at(9)).unwrap();
        state.reject(Uuid::new_v4(), at(10), "seal leak").unwrap();

        assert_eq!(state.status, ApprovalStatus::Rejected);
        assert!(state.supervisor.is_none());
        assert!(state.quality.is_none());
        assert_eq!(state.rejection.as_ref().unwrap().reason, "seal leak");

        // Rejected is terminal for review actions
        assert!(state.supervisor_approve(Uuid::new_v4(), at(11)).is_err());
        assert!(state.reject(Uuid::new_v4(), at(11), "again").is_err());

        let t = state.begin_edit().unwrap().unwrap();
        assert_eq!(t.to, ApprovalStatus::Pending);
        assert!(state.rejection.is_none());
    }

    #[test]
    fn test_quality_approved_is_terminal() {
        let mut state = ApprovalState::default();
        state.supervisor_approve(Uuid::new_v4(), at(9)).unwrap();
        state.quality_approve(Uuid::new_v4(), at(10)).unwrap();

        assert!(state.reject(Uuid::new_v4(), at(11), "late").is_err());
        assert_eq!(state.begin_edit().unwrap_err(), TransitionError::Locked);
        assert!(state.quality.is_some());
    }

    #[test]
    fn test_edit_blocked_while_under_review() {
        let mut state = ApprovalState::default();
        assert_eq!(state.begin_edit().unwrap(), None);
        state.supervisor_approve(Uuid::new_v4(), at(9)).unwrap();
        assert!(matches!(
            state.begin_edit(),
            Err(TransitionError::NotAllowed { action: "edit", .. })
        ));
    }

    #[test]
    fn test_subgroup_quality_needs_supervisor() {
        let mut v = SubgroupVerification::default();
        assert!(v.quality_verify(Uuid::new_v4(), at(9)).is_err());
        v.supervisor_verify(Uuid::new_v4(), at(9)).unwrap();
        v.quality_verify(Uuid::new_v4(), at(10)).unwrap();
        assert_eq!(v.status, SubgroupStatus::QualityVerified);
    }

    #[test]
    fn test_subgroup_immutable_after_quality_verification() {
        let mut v = SubgroupVerification::default();
        v.supervisor_verify(Uuid::new_v4(), at(9)).unwrap();
        v.quality_verify(Uuid::new_v4(), at(10)).unwrap();

        assert_eq!(v.begin_edit().unwrap_err(), TransitionError::Locked);
        assert_eq!(
            v.reject(Uuid::new_v4(), at(11), "x").unwrap_err(),
            TransitionError::Locked
        );
    }

    #[test]
    fn test_subgroup_edit_after_supervisor_verification_resets() {
        let mut v = SubgroupVerification::default();
        v.supervisor_verify(Uuid::new_v4(), at(9)).unwrap();
        let t = v.begin_edit().unwrap().unwrap();
        assert_eq!(t.from, SubgroupStatus::SupervisorVerified);
        assert_eq!(v.status, SubgroupStatus::Pending);
        assert!(v.supervisor.is_none());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for s in ["pending", "supervisor_approved", "quality_approved", "rejected"] {
            assert_eq!(s.parse::<ApprovalStatus>().unwrap().as_str(), s);
        }
        assert!("approved".parse::<ApprovalStatus>().is_err());
        assert!("done".parse::<SubgroupStatus>().is_err());
    }
}
