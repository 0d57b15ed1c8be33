//! Guest domain type
//!
//! Guests are scoped by company and event, and their collections read
//! most-recent-first: a guest added while you watch appears at the top.

use std::fmt;

use chrono::{DateTime, Utc};
use livestore::{DecodeError, Filter, LiveRecord, OrderBy, OrderPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ScopeKey, ScopedRecord};

/// RSVP state of a guest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    #[default]
    Invited,
    Confirmed,
    Declined,
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RsvpStatus::Invited => "invited",
            RsvpStatus::Confirmed => "confirmed",
            RsvpStatus::Declined => "declined",
        };
        write!(f, "{}", s)
    }
}

/// One guest on an event's list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,

    /// Owning company (data partition)
    pub company_id: String,

    /// Event this guest is invited to
    pub event_id: String,

    pub first_name: String,

    pub last_name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub rsvp: RsvpStatus,

    /// When the guest was added; drives the most-recent-first fetch order
    pub created_at: DateTime<Utc>,
}

impl Guest {
    /// Name for display, with missing halves trimmed away
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl LiveRecord for Guest {
    fn table() -> &'static str {
        "guests"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn decode(row: &Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(row.clone())?)
    }
}

impl ScopedRecord for Guest {
    fn scope_filters(scope: &ScopeKey) -> Vec<Filter> {
        vec![
            Filter::eq("company_id", scope.company_id.as_str()),
            Filter::eq("event_id", scope.event_id.as_str()),
        ]
    }

    fn fetch_order() -> OrderBy {
        OrderBy::desc("created_at")
    }

    fn order_policy() -> OrderPolicy {
        OrderPolicy::NewestFirst
    }

    fn in_scope(&self, scope: &ScopeKey) -> bool {
        self.company_id == scope.company_id && self.event_id == scope.event_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> ScopeKey {
        ScopeKey::new("acme", "launch-day").unwrap()
    }

    #[test]
    fn test_decode_full_row() {
        let row = json!({
            "id": "g1",
            "company_id": "acme",
            "event_id": "launch-day",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "rsvp": "confirmed",
            "created_at": "2024-05-01T10:00:00Z",
        });
        let guest = Guest::decode(&row).unwrap();
        assert_eq!(guest.id, "g1");
        assert_eq!(guest.rsvp, RsvpStatus::Confirmed);
        assert_eq!(guest.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_decode_defaults_optional_fields() {
        let row = json!({
            "id": "g1",
            "company_id": "acme",
            "event_id": "launch-day",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "created_at": "2024-05-01T10:00:00Z",
        });
        let guest = Guest::decode(&row).unwrap();
        assert_eq!(guest.rsvp, RsvpStatus::Invited);
        assert!(guest.email.is_none());
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let row = json!({"id": "g1", "company_id": "acme"});
        assert!(Guest::decode(&row).is_err());
    }

    #[test]
    fn test_in_scope() {
        let row = json!({
            "id": "g1",
            "company_id": "acme",
            "event_id": "launch-day",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "created_at": "2024-05-01T10:00:00Z",
        });
        let guest = Guest::decode(&row).unwrap();
        assert!(guest.in_scope(&scope()));
        assert!(!guest.in_scope(&ScopeKey::new("acme", "other-event").unwrap()));
    }

    #[test]
    fn test_scope_filters_cover_both_ids() {
        let filters = Guest::scope_filters(&scope());
        assert_eq!(filters.len(), 2);
        assert!(filters.contains(&Filter::eq("company_id", "acme")));
        assert!(filters.contains(&Filter::eq("event_id", "launch-day")));
    }

    #[test]
    fn test_display_name_trims_missing_half() {
        let mut guest = Guest::decode(&json!({
            "id": "g1",
            "company_id": "acme",
            "event_id": "launch-day",
            "first_name": "Ada",
            "last_name": "",
            "created_at": "2024-05-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(guest.display_name(), "Ada");
        guest.last_name = "Lovelace".to_string();
        assert_eq!(guest.display_name(), "Ada Lovelace");
    }
}
