//! Entry status classification

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::compose::TimelineEntry;

/// Where an entry stands relative to the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Past,
    Current,
    Upcoming,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Past => "past",
            EntryStatus::Current => "current",
            EntryStatus::Upcoming => "upcoming",
        };
        write!(f, "{}", s)
    }
}

/// Classify an entry against `now`
///
/// Both boundaries count as current: an entry is current from the moment
/// it starts through the moment it ends. A zero-duration module is current
/// exactly at its instant.
pub fn classify(entry: &TimelineEntry, now: NaiveDateTime) -> EntryStatus {
    if now < entry.start {
        EntryStatus::Upcoming
    } else if now > entry.end {
        EntryStatus::Past
    } else {
        EntryStatus::Current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{EntryKind, parse_time_of_day};
    use chrono::NaiveDate;

    fn entry(start: &str, end: &str) -> TimelineEntry {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        TimelineEntry {
            id: "e1".to_string(),
            kind: EntryKind::Itinerary,
            title: "Welcome".to_string(),
            start: date.and_time(parse_time_of_day(start).unwrap()),
            end: date.and_time(parse_time_of_day(end).unwrap()),
            location: None,
        }
    }

    fn at(time: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_time(parse_time_of_day(time).unwrap())
    }

    #[test]
    fn test_classify_boundaries_are_inclusive() {
        let e = entry("09:00", "10:00");
        assert_eq!(classify(&e, at("08:59")), EntryStatus::Upcoming);
        assert_eq!(classify(&e, at("09:00")), EntryStatus::Current);
        assert_eq!(classify(&e, at("09:30")), EntryStatus::Current);
        assert_eq!(classify(&e, at("10:00")), EntryStatus::Current);
        assert_eq!(classify(&e, at("10:01")), EntryStatus::Past);
    }

    #[test]
    fn test_classify_zero_duration_module() {
        let e = entry("09:30", "09:30");
        assert_eq!(classify(&e, at("09:29")), EntryStatus::Upcoming);
        assert_eq!(classify(&e, at("09:30")), EntryStatus::Current);
        assert_eq!(classify(&e, at("09:31")), EntryStatus::Past);
    }
}
