//! Timeline composition
//!
//! Turns one day's itinerary items and modules into a single ordered list
//! of concrete instants. Backend rows carry dates and wall-clock strings;
//! everything downstream (status, positioning, rendering) works on the
//! composed `TimelineEntry` instants instead.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ItineraryItem, ModuleType, TimelineModule};

/// Length of an itinerary item that has no end time
const DEFAULT_ITEM_DURATION_MINUTES: i64 = 60;

/// What a timeline entry was composed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Itinerary,
    Module(ModuleType),
}

/// One composed entry on the day timeline
///
/// Modules are instantaneous, so their `end` equals their `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub kind: EntryKind,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub location: Option<String>,
}

impl TimelineEntry {
    pub fn is_module(&self) -> bool {
        matches!(self.kind, EntryKind::Module(_))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Parse a backend time-of-day string, accepting "HH:MM:SS" and "HH:MM"
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Compose one day's timeline from itinerary items and modules
///
/// Draft items, rows scheduled on other days, untimed rows and modules
/// hidden from the timeline are all left out. Rows with a present but
/// unparseable start time are dropped with a warning rather than guessed
/// at. The result is sorted by start ascending; the sort is stable, so
/// items stay ahead of modules that share an instant.
pub fn compose_timeline(
    date: NaiveDate,
    items: &[ItineraryItem],
    modules: &[TimelineModule],
) -> Vec<TimelineEntry> {
    let mut entries = Vec::new();

    for item in items {
        if !item.on_date(date) || item.draft {
            continue;
        }
        let Some(start_raw) = item.start_time.as_deref() else {
            continue;
        };
        let Some(start_time) = parse_time_of_day(start_raw) else {
            warn!(
                id = %item.id,
                start_time = start_raw,
                "compose_timeline: unparseable start time, skipping item"
            );
            continue;
        };
        let start = date.and_time(start_time);
        entries.push(TimelineEntry {
            id: item.id.clone(),
            kind: EntryKind::Itinerary,
            title: item.title.clone(),
            start,
            end: item_end(item, date, start),
            location: item.location.clone(),
        });
    }

    for module in modules {
        if !module.on_date(date) || !module.on_timeline {
            continue;
        }
        let Some(time_raw) = module.time.as_deref() else {
            continue;
        };
        let Some(time) = parse_time_of_day(time_raw) else {
            warn!(
                id = %module.id,
                time = time_raw,
                "compose_timeline: unparseable module time, skipping"
            );
            continue;
        };
        let at = date.and_time(time);
        entries.push(TimelineEntry {
            id: module.id.clone(),
            kind: EntryKind::Module(module.kind),
            title: module.display_text(),
            start: at,
            end: at,
            location: None,
        });
    }

    entries.sort_by_key(|entry| entry.start);
    entries
}

/// Resolve an item's end instant
///
/// An end earlier than the start means the item crosses midnight into the
/// next day. A missing or unparseable end falls back to the default
/// duration.
fn item_end(item: &ItineraryItem, date: NaiveDate, start: NaiveDateTime) -> NaiveDateTime {
    let end_time = match item.end_time.as_deref() {
        Some(raw) => match parse_time_of_day(raw) {
            Some(parsed) => Some(parsed),
            None => {
                warn!(
                    id = %item.id,
                    end_time = raw,
                    "item_end: unparseable end time, using default duration"
                );
                None
            }
        },
        None => None,
    };

    match end_time {
        Some(end_time) => {
            let end = date.and_time(end_time);
            if end < start {
                end + Duration::days(1)
            } else {
                end
            }
        }
        None => start + Duration::minutes(DEFAULT_ITEM_DURATION_MINUTES),
    }
}

/// How far through the day an instant falls, as a percentage
///
/// Instants outside the day (an end that crossed midnight, say) clamp to
/// the nearest edge so callers can always lay them out.
pub fn day_position(instant: NaiveDateTime, date: NaiveDate) -> f64 {
    let start_of_day = date.and_time(NaiveTime::MIN);
    let elapsed = (instant - start_of_day).num_seconds() as f64;
    (elapsed / 86_400_f64).clamp(0.0, 1.0) * 100.0
}
