//! Domain models shared by the database and HTTP layers

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::approval::{ApprovalState, ApprovalStatus, SubgroupVerification};
use crate::sampling::SamplingPlan;
use crate::shift::Shift;
use crate::Error;

/// Implements `as_str`, `Display` and `FromStr` for a unit-variant enum
/// stored as TEXT
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        concat!("Unknown ", stringify!($ty), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    ShiftSupervisor,
    QualitySupervisor,
    Admin,
}

text_enum!(Role {
    Operator => "operator",
    ShiftSupervisor => "shift_supervisor",
    QualitySupervisor => "quality_supervisor",
    Admin => "admin",
});

impl Role {
    /// May sign the supervisor stage
    pub fn can_supervise(&self) -> bool {
        matches!(self, Role::ShiftSupervisor | Role::Admin)
    }

    /// May sign the quality stage
    pub fn can_quality_review(&self) -> bool {
        matches!(self, Role::QualitySupervisor | Role::Admin)
    }

    /// May reject at either review stage
    pub fn can_reject(&self) -> bool {
        self.can_supervise() || self.can_quality_review()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// Verification aggregate
// ============================================================================

/// Overall state of one operator's shift record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

text_enum!(VerificationState {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Rejected => "rejected",
});

/// Approval status of each child record, `None` when not created yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildStatuses {
    pub checklist: Option<ApprovalStatus>,
    pub ftq: Option<ApprovalStatus>,
    pub equipment: Option<ApprovalStatus>,
}

/// Flags telling each actor that something waits for them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notifications {
    pub supervisor: bool,
    pub quality: bool,
    pub operator: bool,
}

impl ChildStatuses {
    fn present(&self) -> impl Iterator<Item = ApprovalStatus> {
        [self.checklist, self.ftq, self.equipment].into_iter().flatten()
    }

    pub fn state(&self) -> VerificationState {
        let present: Vec<ApprovalStatus> = self.present().collect();
        if present.is_empty() {
            VerificationState::Pending
        } else if present.contains(&ApprovalStatus::Rejected) {
            VerificationState::Rejected
        } else if present.len() == 3 && present.iter().all(|s| s.is_final()) {
            VerificationState::Completed
        } else {
            VerificationState::InProgress
        }
    }

    pub fn notifications(&self) -> Notifications {
        let mut flags = Notifications::default();
        for status in self.present() {
            match status {
                ApprovalStatus::Pending => flags.supervisor = true,
                ApprovalStatus::SupervisorApproved => flags.quality = true,
                ApprovalStatus::Rejected => flags.operator = true,
                ApprovalStatus::QualityApproved => {}
            }
        }
        flags
    }
}

/// One operator's record for one shift on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
    pub status: VerificationState,
    pub notifications: Notifications,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ============================================================================
// Checklist and subgroups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckResult {
    Ok,
    Nok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

/// Fixed checklist readings filled by the operator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistReadings {
    /// bar
    pub line_pressure: Option<f64>,
    pub oring_condition: Option<CheckResult>,
    /// kPa
    pub uv_flow_input_pressure: Option<f64>,
    pub master_verification_lvdt: Option<CheckResult>,
    pub good_bad_master_verification: Option<CheckResult>,
    /// MPa
    pub test_pressure_vacuum: Option<f64>,
    pub tool_alignment: Option<CheckResult>,
    pub top_tool_id: Option<String>,
    pub bottom_tool_id: Option<String>,
    /// LPM
    pub uv_flow_value: Option<f64>,
    pub umbrella_valve_assembly: Option<CheckResult>,
    pub uv_clip_pressing: Option<CheckResult>,
    pub workstation_clean: Option<YesNo>,
    pub bin_contamination_check: Option<YesNo>,
}

impl ChecklistReadings {
    /// Numeric readings subject to tolerance checks
    pub fn numeric(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("line_pressure", self.line_pressure),
            ("uv_flow_input_pressure", self.uv_flow_input_pressure),
            ("test_pressure_vacuum", self.test_pressure_vacuum),
            ("uv_flow_value", self.uv_flow_value),
        ]
    }

    /// Names of OK/NOK checks answered NOK
    pub fn nok_checks(&self) -> Vec<&'static str> {
        [
            ("oring_condition", self.oring_condition),
            ("master_verification_lvdt", self.master_verification_lvdt),
            ("good_bad_master_verification", self.good_bad_master_verification),
            ("tool_alignment", self.tool_alignment),
            ("umbrella_valve_assembly", self.umbrella_valve_assembly),
            ("uv_clip_pressing", self.uv_clip_pressing),
        ]
        .into_iter()
        .filter(|(_, result)| *result == Some(CheckResult::Nok))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: Uuid,
    pub verification_id: Uuid,
    pub model: String,
    pub line: String,
    pub machine: String,
    pub shift_start: NaiveDateTime,
    pub sampling_config_id: Option<Uuid>,
    pub readings: ChecklistReadings,
    pub approval: ApprovalState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One periodic measurement batch of a checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgroup {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub sequence: u32,
    pub recorded_at: NaiveDateTime,
    pub readings: Vec<f64>,
    pub verification: SubgroupVerification,
}

/// Stored sampling frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub id: Uuid,
    pub name: String,
    pub interval_minutes: i64,
    pub max_subgroups: i64,
    pub active: bool,
}

impl SamplingConfig {
    pub fn plan(&self) -> SamplingPlan {
        SamplingPlan::from_minutes(Some(self.interval_minutes), Some(self.max_subgroups))
    }
}

// ============================================================================
// Equipment checks (EP / DTPM)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCheckKind {
    /// Error-prevention (poka-yoke) mechanism check
    ErrorProofing,
    /// Daily Tracking and Performance Monitoring checkpoints
    Dtpm,
}

text_enum!(EquipmentCheckKind {
    ErrorProofing => "error_proofing",
    Dtpm => "dtpm",
});

impl EquipmentCheckKind {
    /// Fixed checkpoint catalogue: (code, description)
    pub fn catalogue(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            EquipmentCheckKind::ErrorProofing => &[
                ("EP-01", "O-ring presence sensor rejects part without O-ring"),
                ("EP-02", "Umbrella valve presence sensor rejects missing valve"),
                ("EP-03", "Leak tester rejects master NG part"),
                ("EP-04", "UV clip pressing height sensor detects unpressed clip"),
                ("EP-05", "LVDT detects out-of-dimension master"),
                ("EP-06", "Barcode scanner blocks wrong model label"),
                ("EP-07", "Reject bin door interlock stops cycle when open"),
            ],
            EquipmentCheckKind::Dtpm => &[
                ("DT-01", "Air filter regulator drained and clean"),
                ("DT-02", "Pneumatic lines free of leaks"),
                ("DT-03", "Fixture clamps tight and undamaged"),
                ("DT-04", "Safety light curtain functional"),
                ("DT-05", "Emergency stop functional"),
                ("DT-06", "Lubrication points serviced"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
    #[serde(rename = "NA")]
    Na,
}

text_enum!(CheckpointStatus {
    Ok => "OK",
    Ng => "NG",
    Na => "NA",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub code: String,
    pub description: String,
    pub status: Option<CheckpointStatus>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentCheck {
    pub id: Uuid,
    pub verification_id: Uuid,
    pub kind: EquipmentCheckKind,
    pub entries: Vec<CheckpointEntry>,
    pub approval: ApprovalState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Append-only record of one checkpoint field change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentChange {
    pub id: i64,
    pub check_id: Uuid,
    pub checkpoint_code: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_by: Uuid,
    pub changed_at: NaiveDateTime,
}

// ============================================================================
// First Time Quality
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtqRecord {
    pub id: Uuid,
    pub verification_id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
    pub model: String,
    pub total_inspected: i64,
    pub total_defects: i64,
    pub approval: ApprovalState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FtqRecord {
    pub fn ftq_percent(&self) -> Option<f64> {
        ftq_percent(self.total_inspected, self.total_defects)
    }
}

/// Share of inspected units without a defect, clamped at zero
pub fn ftq_percent(inspected: i64, defects: i64) -> Option<f64> {
    if inspected <= 0 {
        return None;
    }
    let good = (inspected - defects).max(0);
    Some(good as f64 / inspected as f64 * 100.0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub id: Uuid,
    pub ftq_id: Uuid,
    pub operation: String,
    pub defect_type: String,
    pub count: i64,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// Approval history
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Checklist,
    Subgroup,
    EquipmentCheck,
    Ftq,
}

text_enum!(RecordType {
    Checklist => "checklist",
    Subgroup => "subgroup",
    EquipmentCheck => "equipment_check",
    Ftq => "ftq",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub record_type: RecordType,
    pub record_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub action: String,
    pub actor_id: Uuid,
    pub comment: Option<String>,
    pub at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_derivation() {
        use ApprovalStatus::*;

        assert_eq!(ChildStatuses::default().state(), VerificationState::Pending);

        let partial = ChildStatuses {
            checklist: Some(QualityApproved),
            ..Default::default()
        };
        assert_eq!(partial.state(), VerificationState::InProgress);

        let rejected = ChildStatuses {
            checklist: Some(SupervisorApproved),
            ftq: Some(Rejected),
            equipment: None,
        };
        assert_eq!(rejected.state(), VerificationState::Rejected);

        let done = ChildStatuses {
            checklist: Some(QualityApproved),
            ftq: Some(QualityApproved),
            equipment: Some(QualityApproved),
        };
        assert_eq!(done.state(), VerificationState::Completed);
    }

    #[test]
    fn test_notifications_point_at_next_actor() {
        use ApprovalStatus::*;

        let flags = ChildStatuses {
            checklist: Some(Pending),
            ftq: Some(SupervisorApproved),
            equipment: Some(Rejected),
        }
        .notifications();
        assert!(flags.supervisor && flags.quality && flags.operator);

        let flags = ChildStatuses {
            checklist: Some(QualityApproved),
            ftq: None,
            equipment: None,
        }
        .notifications();
        assert_eq!(flags, Notifications::default());
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::ShiftSupervisor.can_supervise());
        assert!(!Role::ShiftSupervisor.can_quality_review());
        assert!(Role::QualitySupervisor.can_quality_review());
        assert!(Role::Admin.can_supervise() && Role::Admin.can_quality_review());
        assert!(!Role::Operator.can_reject());
        assert_eq!("quality_supervisor".parse::<Role>().unwrap(), Role::QualitySupervisor);
        assert!("boss".parse::<Role>().is_err());
    }

    #[test]
    fn test_ftq_percent() {
        assert_eq!(ftq_percent(0, 0), None);
        assert_eq!(ftq_percent(200, 10), Some(95.0));
        assert_eq!(ftq_percent(10, 25), Some(0.0));
    }

    #[test]
    fn test_nok_checks_lists_failed_items() {
        let readings = ChecklistReadings {
            oring_condition: Some(CheckResult::Nok),
            tool_alignment: Some(CheckResult::Ok),
            uv_clip_pressing: Some(CheckResult::Nok),
            ..Default::default()
        };
        assert_eq!(readings.nok_checks(), vec!["oring_condition", "uv_clip_pressing"]);
    }

    #[test]
    fn test_readings_json_shape() {
        let readings: ChecklistReadings = serde_json::from_str(
            r#"{"line_pressure": 5.1, "oring_condition": "OK", "workstation_clean": "yes"}"#,
        )
        .unwrap();
        assert_eq!(readings.line_pressure, Some(5.1));
        assert_eq!(readings.oring_condition, Some(CheckResult::Ok));
        assert_eq!(readings.workstation_clean, Some(YesNo::Yes));
        assert_eq!(readings.uv_flow_value, None);
    }

    #[test]
    fn test_catalogues_have_unique_codes() {
        for kind in [EquipmentCheckKind::ErrorProofing, EquipmentCheckKind::Dtpm] {
            let codes: std::collections::HashSet<_> =
                kind.catalogue().iter().map(|(code, _)| *code).collect();
            assert_eq!(codes.len(), kind.catalogue().len());
        }
    }
}
