//! Interactive module domain type
//!
//! Modules are audience interactions (polls, quizzes, check-ins) that can be
//! pinned to a time of day and shown between itinerary items on the timeline.

use chrono::NaiveDate;
use livestore::{DecodeError, Filter, LiveRecord, OrderBy, OrderPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ScopeKey, ScopedRecord};

/// The closed set of module kinds the product ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Poll,
    Quiz,
    Question,
    Announcement,
    Checkin,
}

impl ModuleType {
    /// Human-readable label, used when a module carries no text of its own
    pub fn label(&self) -> &'static str {
        match self {
            ModuleType::Poll => "Poll",
            ModuleType::Quiz => "Quiz",
            ModuleType::Question => "Question",
            ModuleType::Announcement => "Announcement",
            ModuleType::Checkin => "Check-in",
        }
    }
}

/// One interactive module attached to an event day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineModule {
    pub id: String,

    /// Event this module belongs to
    pub event_id: String,

    /// Calendar day the module is scheduled on
    pub date: NaiveDate,

    /// Time of day as "HH:MM" or "HH:MM:SS"; untimed modules stay off
    /// the timeline
    #[serde(default)]
    pub time: Option<String>,

    #[serde(rename = "module_type")]
    pub kind: ModuleType,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub question: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    /// Organizers can hide a module from the timeline without unscheduling it
    #[serde(default = "default_on_timeline")]
    pub on_timeline: bool,
}

fn default_on_timeline() -> bool {
    true
}

impl TimelineModule {
    /// Display text: the first non-blank of title, question, label, falling
    /// back to the kind's label
    pub fn display_text(&self) -> String {
        [&self.title, &self.question, &self.label]
            .into_iter()
            .filter_map(|text| text.as_deref())
            .map(str::trim)
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| self.kind.label())
            .to_string()
    }

    /// Whether this module is scheduled on the given day
    pub fn on_date(&self, date: NaiveDate) -> bool {
        self.date == date
    }
}

impl LiveRecord for TimelineModule {
    fn table() -> &'static str {
        "timeline_modules"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn decode(row: &Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(row.clone())?)
    }
}

impl ScopedRecord for TimelineModule {
    fn scope_filters(scope: &ScopeKey) -> Vec<Filter> {
        vec![Filter::eq("event_id", scope.event_id.as_str())]
    }

    fn fetch_order() -> OrderBy {
        OrderBy::asc("date")
    }

    fn order_policy() -> OrderPolicy {
        OrderPolicy::Append
    }

    fn in_scope(&self, scope: &ScopeKey) -> bool {
        self.event_id == scope.event_id
    }
}
