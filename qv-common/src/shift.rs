//! Shift detection
//!
//! Maps a plant-local wall-clock time to one of six shift codes. Two views of
//! the day exist on the floor: 12-hour halves (S1/S2) and the rotating
//! A/B/C shifts with an optional general day shift (G). A [`ShiftPattern`]
//! selects exactly one precedence list, so every time of day resolves to a
//! single code.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::time::Clock;
use crate::Error;

/// Shift codes used on the shop floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shift {
    /// Day half, 06:30-18:30
    S1,
    /// Night half, 18:30-06:30
    S2,
    /// Morning rotating shift, 06:30-15:00
    A,
    /// General day shift, 09:00-17:30
    G,
    /// Afternoon rotating shift, 15:00-23:30
    B,
    /// Night rotating shift, 23:30-06:30
    C,
}

pub const ALL_SHIFTS: [Shift; 6] = [Shift::S1, Shift::S2, Shift::A, Shift::G, Shift::B, Shift::C];

fn hm(hour: u32, minute: u32) -> NaiveTime {
    // Only called with literal in-range values below
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Shift {
    pub fn code(&self) -> &'static str {
        match self {
            Shift::S1 => "S1",
            Shift::S2 => "S2",
            Shift::A => "A",
            Shift::G => "G",
            Shift::B => "B",
            Shift::C => "C",
        }
    }

    /// Start and end of the shift window (end exclusive)
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        match self {
            Shift::S1 => (hm(6, 30), hm(18, 30)),
            Shift::S2 => (hm(18, 30), hm(6, 30)),
            Shift::A => (hm(6, 30), hm(15, 0)),
            Shift::G => (hm(9, 0), hm(17, 30)),
            Shift::B => (hm(15, 0), hm(23, 30)),
            Shift::C => (hm(23, 30), hm(6, 30)),
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        let (start, end) = self.window();
        end <= start
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let (start, end) = self.window();
        if self.crosses_midnight() {
            time >= start || time < end
        } else {
            time >= start && time < end
        }
    }

    /// Wall-clock start of this shift on the given shift date
    pub fn start_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.window().0)
    }

    /// Wall-clock end of this shift on the given shift date
    pub fn end_on(&self, date: NaiveDate) -> NaiveDateTime {
        let (_, end) = self.window();
        let end_date = if self.crosses_midnight() {
            date + Duration::days(1)
        } else {
            date
        };
        end_date.and_time(end)
    }

    /// Date a shift running at `now` belongs to
    ///
    /// Shifts crossing midnight belong to the day they started on.
    pub fn date_for(&self, now: NaiveDateTime) -> NaiveDate {
        let (_, end) = self.window();
        if self.crosses_midnight() && now.time() < end {
            now.date() - Duration::days(1)
        } else {
            now.date()
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Shift {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S1" => Ok(Shift::S1),
            "S2" => Ok(Shift::S2),
            "A" => Ok(Shift::A),
            "G" => Ok(Shift::G),
            "B" => Ok(Shift::B),
            "C" => Ok(Shift::C),
            other => Err(Error::InvalidInput(format!("Unknown shift code: {}", other))),
        }
    }
}

/// Which set of shift windows the plant runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPattern {
    /// A/B/C rotating shifts
    #[default]
    Rotating,
    /// G during its window, A/B/C otherwise
    RotatingWithGeneral,
    /// S1/S2 12-hour halves
    TwelveHour,
}

impl ShiftPattern {
    /// Shifts checked in order; the first window containing the time wins
    pub fn precedence(&self) -> &'static [Shift] {
        match self {
            ShiftPattern::Rotating => &[Shift::A, Shift::B, Shift::C],
            ShiftPattern::RotatingWithGeneral => &[Shift::G, Shift::A, Shift::B, Shift::C],
            ShiftPattern::TwelveHour => &[Shift::S1, Shift::S2],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftPattern::Rotating => "rotating",
            ShiftPattern::RotatingWithGeneral => "rotating_with_general",
            ShiftPattern::TwelveHour => "twelve_hour",
        }
    }
}

impl FromStr for ShiftPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rotating" => Ok(ShiftPattern::Rotating),
            "rotating_with_general" => Ok(ShiftPattern::RotatingWithGeneral),
            "twelve_hour" => Ok(ShiftPattern::TwelveHour),
            other => Err(Error::InvalidInput(format!("Unknown shift pattern: {}", other))),
        }
    }
}

/// Resolve the shift running at `time` under `pattern`
pub fn detect_shift(pattern: ShiftPattern, time: NaiveTime) -> Shift {
    let precedence = pattern.precedence();
    precedence
        .iter()
        .copied()
        .find(|shift| shift.contains(time))
        // Every precedence list covers the full day
        .unwrap_or(precedence[precedence.len() - 1])
}

/// Shift in progress at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrentShift {
    pub shift: Shift,
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CurrentShift {
    pub fn at(pattern: ShiftPattern, now: NaiveDateTime) -> Self {
        let shift = detect_shift(pattern, now.time());
        let date = shift.date_for(now);
        Self {
            shift,
            date,
            start: shift.start_on(date),
            end: shift.end_on(date),
        }
    }

    pub fn from_clock(pattern: ShiftPattern, clock: &dyn Clock) -> Self {
        Self::at(pattern, clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_every_minute_maps_to_exactly_one_shift_in_pattern() {
        for pattern in [
            ShiftPattern::Rotating,
            ShiftPattern::RotatingWithGeneral,
            ShiftPattern::TwelveHour,
        ] {
            for minute in 0..(24 * 60) {
                let time = t(minute / 60, minute % 60);
                let shift = detect_shift(pattern, time);
                assert!(ALL_SHIFTS.contains(&shift));
                assert!(shift.contains(time), "{:?} at {} -> {}", pattern, time, shift);
                assert!(pattern.precedence().contains(&shift));
            }
        }
    }

    #[test]
    fn test_rotating_boundaries() {
        let p = ShiftPattern::Rotating;
        assert_eq!(detect_shift(p, t(6, 29)), Shift::C);
        assert_eq!(detect_shift(p, t(6, 30)), Shift::A);
        assert_eq!(detect_shift(p, t(14, 59)), Shift::A);
        assert_eq!(detect_shift(p, t(15, 0)), Shift::B);
        assert_eq!(detect_shift(p, t(23, 29)), Shift::B);
        assert_eq!(detect_shift(p, t(23, 30)), Shift::C);
        assert_eq!(detect_shift(p, t(0, 0)), Shift::C);
    }

    #[test]
    fn test_general_shift_takes_precedence_inside_its_window() {
        let p = ShiftPattern::RotatingWithGeneral;
        assert_eq!(detect_shift(p, t(8, 59)), Shift::A);
        assert_eq!(detect_shift(p, t(9, 0)), Shift::G);
        assert_eq!(detect_shift(p, t(17, 29)), Shift::G);
        assert_eq!(detect_shift(p, t(17, 30)), Shift::B);
    }

    #[test]
    fn test_twelve_hour_halves() {
        let p = ShiftPattern::TwelveHour;
        assert_eq!(detect_shift(p, t(6, 30)), Shift::S1);
        assert_eq!(detect_shift(p, t(18, 29)), Shift::S1);
        assert_eq!(detect_shift(p, t(18, 30)), Shift::S2);
        assert_eq!(detect_shift(p, t(3, 0)), Shift::S2);
    }

    #[test]
    fn test_night_shift_belongs_to_start_date() {
        let current = CurrentShift::at(ShiftPattern::Rotating, dt(5, 2, 15));
        assert_eq!(current.shift, Shift::C);
        assert_eq!(current.date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(current.start, dt(4, 23, 30));
        assert_eq!(current.end, dt(5, 6, 30));

        let current = CurrentShift::at(ShiftPattern::Rotating, dt(5, 23, 45));
        assert_eq!(current.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_parse_codes_and_patterns() {
        assert_eq!("s1".parse::<Shift>().unwrap(), Shift::S1);
        assert_eq!(" G ".parse::<Shift>().unwrap(), Shift::G);
        assert!("D".parse::<Shift>().is_err());
        assert_eq!(
            "twelve_hour".parse::<ShiftPattern>().unwrap(),
            ShiftPattern::TwelveHour
        );
        assert!("weekly".parse::<ShiftPattern>().is_err());
    }
}
