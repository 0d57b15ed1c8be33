//! Itinerary item domain type

use chrono::NaiveDate;
use livestore::{DecodeError, Filter, LiveRecord, OrderBy, OrderPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ScopeKey, ScopedRecord};

/// One scheduled agenda row for an event day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItem {
    pub id: String,

    /// Event this item belongs to
    pub event_id: String,

    /// Calendar day the item is scheduled on
    pub date: NaiveDate,

    /// Start time of day as "HH:MM" or "HH:MM:SS"; items without one
    /// never reach the composed timeline
    #[serde(default)]
    pub start_time: Option<String>,

    /// End time of day; missing means the item runs for a default hour
    #[serde(default)]
    pub end_time: Option<String>,

    pub title: String,

    #[serde(default)]
    pub location: Option<String>,

    /// Draft items are visible to organizers only and stay off the timeline
    #[serde(default)]
    pub draft: bool,
}

impl ItineraryItem {
    /// Whether this item is scheduled on the given day
    pub fn on_date(&self, date: NaiveDate) -> bool {
        self.date == date
    }
}

impl LiveRecord for ItineraryItem {
    fn table() -> &'static str {
        "itinerary_items"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn decode(row: &Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(row.clone())?)
    }
}

impl ScopedRecord for ItineraryItem {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_minimal_row() {
        let row = json!({
            "id": "it1",
            "event_id": "launch-day",
            "date": "2024-05-01",
            "title": "Welcome",
        });
        let item = ItineraryItem::decode(&row).unwrap();
        assert_eq!(item.title, "Welcome");
        assert!(item.start_time.is_none());
        assert!(!item.draft);
    }

    #[test]
    fn test_decode_full_row() {
        let row = json!({
            "id": "it1",
            "event_id": "launch-day",
            "date": "2024-05-01",
            "start_time": "09:00",
            "end_time": "10:00",
            "title": "Welcome",
            "location": "Main hall",
            "draft": true,
        });
        let item = ItineraryItem::decode(&row).unwrap();
        assert_eq!(item.start_time.as_deref(), Some("09:00"));
        assert_eq!(item.location.as_deref(), Some("Main hall"));
        assert!(item.draft);
    }

    #[test]
    fn test_decode_rejects_bad_date() {
        let row = json!({
            "id": "it1",
            "event_id": "launch-day",
            "date": "yesterday",
            "title": "Welcome",
        });
        assert!(ItineraryItem::decode(&row).is_err());
    }

    #[test]
    fn test_on_date() {
        let item = ItineraryItem::decode(&json!({
            "id": "it1",
            "event_id": "launch-day",
            "date": "2024-05-01",
            "title": "Welcome",
        }))
        .unwrap();
        assert!(item.on_date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
        assert!(!item.on_date(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()));
    }

    #[test]
    fn test_scope_filters_use_event_only() {
        let scope = ScopeKey::new("acme", "launch-day").unwrap();
        let filters = ItineraryItem::scope_filters(&scope);
        assert_eq!(filters, vec![Filter::eq("event_id", "launch-day")]);
    }
}
