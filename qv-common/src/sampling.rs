//! Subgroup timing gate
//!
//! A checklist collects periodic measurement batches (subgroups) at fixed
//! slots after the shift start. A batch may only be added once its slot has
//! been reached, and never more than `max_subgroups` per checklist.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default spacing between subgroup slots
pub const DEFAULT_INTERVAL_MINUTES: i64 = 120;

/// Default number of subgroup slots per checklist
pub const DEFAULT_MAX_SUBGROUPS: u32 = 6;

/// Upper bound on readings carried by one subgroup
pub const MAX_READINGS_PER_SUBGROUP: usize = 21;

/// Longest accepted spacing between slots (one day)
pub const MAX_INTERVAL_MINUTES: i64 = 24 * 60;

/// Most subgroup slots a checklist may carry
pub const MAX_SUBGROUPS_LIMIT: u32 = 48;

/// Reject sampling values outside `1..=MAX_INTERVAL_MINUTES` and
/// `1..=MAX_SUBGROUPS_LIMIT`
pub fn check_bounds(interval_minutes: i64, max_subgroups: i64) -> Result<()> {
    if !(1..=MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
        return Err(Error::InvalidInput(format!(
            "sampling_interval_minutes must be between 1 and {}, got {}",
            MAX_INTERVAL_MINUTES, interval_minutes
        )));
    }
    if !(1..=MAX_SUBGROUPS_LIMIT as i64).contains(&max_subgroups) {
        return Err(Error::InvalidInput(format!(
            "sampling_max_subgroups must be between 1 and {}, got {}",
            MAX_SUBGROUPS_LIMIT, max_subgroups
        )));
    }
    Ok(())
}

/// Sampling frequency applied to a checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    pub interval: Duration,
    pub max_subgroups: u32,
}

impl Default for SamplingPlan {
    fn default() -> Self {
        Self {
            interval: Duration::minutes(DEFAULT_INTERVAL_MINUTES),
            max_subgroups: DEFAULT_MAX_SUBGROUPS,
        }
    }
}

impl SamplingPlan {
    /// Build a plan from stored values, falling back to defaults for
    /// missing or out-of-range entries
    pub fn from_minutes(interval_minutes: Option<i64>, max_subgroups: Option<i64>) -> Self {
        let defaults = Self::default();
        let interval = interval_minutes
            .filter(|m| (1..=MAX_INTERVAL_MINUTES).contains(m))
            .map(Duration::minutes)
            .unwrap_or(defaults.interval);
        let max_subgroups = max_subgroups
            .filter(|n| (1..=MAX_SUBGROUPS_LIMIT as i64).contains(n))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(defaults.max_subgroups);

        Self {
            interval,
            max_subgroups,
        }
    }

    pub fn interval_minutes(&self) -> i64 {
        self.interval.num_minutes()
    }
}

/// Outcome of a gate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// A new subgroup may be recorded now
    pub can_add: bool,
    /// Slot time of the next subgroup, `None` once all slots are used
    pub next_allowed_at: Option<NaiveDateTime>,
    /// Slots whose time has been reached
    pub unlocked: u32,
    /// Subgroups already recorded
    pub recorded: u32,
    pub max_subgroups: u32,
}

/// Expected slot timestamps: shift_start + i * interval for i in [0, max)
///
/// Slots past the representable date range are dropped.
pub fn slot_times(shift_start: NaiveDateTime, plan: &SamplingPlan) -> Vec<NaiveDateTime> {
    (0..plan.max_subgroups)
        .map_while(|i| {
            plan.interval
                .checked_mul(i as i32)
                .and_then(|offset| shift_start.checked_add_signed(offset))
        })
        .collect()
}

/// Decide whether another subgroup may be recorded at `now`
pub fn evaluate(
    shift_start: NaiveDateTime,
    plan: &SamplingPlan,
    recorded: u32,
    now: NaiveDateTime,
) -> GateDecision {
    let slots = slot_times(shift_start, plan);
    let unlocked = slots.iter().filter(|slot| **slot <= now).count() as u32;
    let next_allowed_at = slots.get(recorded as usize).copied();

    GateDecision {
        can_add: unlocked > recorded,
        next_allowed_at,
        unlocked,
        recorded,
        max_subgroups: plan.max_subgroups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_default_plan_slots() {
        let slots = slot_times(at(6, 30), &SamplingPlan::default());
        assert_eq!(
            slots,
            vec![at(6, 30), at(8, 30), at(10, 30), at(12, 30), at(14, 30), at(16, 30)]
        );
    }

    #[test]
    fn test_two_slots_unlocked_at_nine() {
        let decision = evaluate(at(6, 30), &SamplingPlan::default(), 0, at(9, 0));
        assert_eq!(decision.unlocked, 2);
        assert!(decision.can_add);
        assert_eq!(decision.next_allowed_at, Some(at(6, 30)));
    }

    #[test]
    fn test_blocked_until_next_slot() {
        let decision = evaluate(at(6, 30), &SamplingPlan::default(), 2, at(9, 0));
        assert!(!decision.can_add);
        assert_eq!(decision.next_allowed_at, Some(at(10, 30)));

        let decision = evaluate(at(6, 30), &SamplingPlan::default(), 2, at(10, 30));
        assert!(decision.can_add);
    }

    #[test]
    fn test_before_shift_start_nothing_unlocked() {
        let decision = evaluate(at(6, 30), &SamplingPlan::default(), 0, at(6, 0));
        assert_eq!(decision.unlocked, 0);
        assert!(!decision.can_add);
    }

    #[test]
    fn test_never_more_than_max_subgroups() {
        let plan = SamplingPlan::default();
        // Long after the shift every slot is open, but only max can be recorded
        let late = at(23, 59);
        for recorded in 0..=10u32 {
            let decision = evaluate(at(6, 30), &plan, recorded, late);
            assert_eq!(decision.unlocked, plan.max_subgroups);
            assert_eq!(decision.can_add, recorded < plan.max_subgroups);
        }
        let done = evaluate(at(6, 30), &plan, 6, late);
        assert_eq!(done.next_allowed_at, None);
    }

    #[test]
    fn test_can_add_implies_slot_reached() {
        let plan = SamplingPlan::from_minutes(Some(45), Some(8));
        let start = at(6, 30);
        for minute in 0..(18 * 60) {
            let now = start + Duration::minutes(minute);
            for recorded in 0..plan.max_subgroups {
                let decision = evaluate(start, &plan, recorded, now);
                if decision.can_add {
                    assert!(decision.next_allowed_at.unwrap() <= now);
                }
            }
        }
    }

    #[test]
    fn test_sampling_bounds() {
        assert!(check_bounds(1, 1).is_ok());
        assert!(check_bounds(MAX_INTERVAL_MINUTES, MAX_SUBGROUPS_LIMIT as i64).is_ok());
        assert!(matches!(check_bounds(0, 6), Err(Error::InvalidInput(_))));
        assert!(matches!(
            check_bounds(MAX_INTERVAL_MINUTES + 1, 6),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(check_bounds(120, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(
            check_bounds(120, MAX_SUBGROUPS_LIMIT as i64 + 1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_out_of_range_stored_values_use_defaults() {
        let plan = SamplingPlan::from_minutes(Some(100_000_000_000), Some(i64::MAX));
        assert_eq!(plan, SamplingPlan::default());
    }

    #[test]
    fn test_slots_near_end_of_calendar_are_dropped() {
        let plan = SamplingPlan::from_minutes(Some(MAX_INTERVAL_MINUTES), Some(4));
        let start = NaiveDateTime::MAX - Duration::days(2);
        let slots = slot_times(start, &plan);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], start);

        let decision = evaluate(start, &plan, 3, NaiveDateTime::MAX);
        assert_eq!(decision.unlocked, 3);
        assert_eq!(decision.next_allowed_at, None);
        assert!(!decision.can_add);
    }

    #[test]
    fn test_from_minutes_falls_back_to_defaults() {
        assert_eq!(SamplingPlan::from_minutes(None, None), SamplingPlan::default());
        assert_eq!(
            SamplingPlan::from_minutes(Some(0), Some(-3)),
            SamplingPlan::default()
        );
        let plan = SamplingPlan::from_minutes(Some(60), Some(4));
        assert_eq!(plan.interval_minutes(), 60);
        assert_eq!(plan.max_subgroups, 4);
    }
}
