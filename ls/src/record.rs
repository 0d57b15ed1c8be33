//! Record contract and row predicates
//!
//! Backend rows travel as JSON objects and are decoded into typed records at
//! the ingestion boundary. A `LiveRecord` knows its table, its id, and how to
//! decode itself from a raw row.

use serde_json::Value;
use thiserror::Error;

/// Error decoding a raw backend row into a typed record
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Row failed structural validation for the record type
    #[error("malformed row: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Row carries no usable string `id` field
    #[error("row has no id field")]
    MissingId,
}

/// A typed record mirrored from one backend table
pub trait LiveRecord: Clone + Send + Sized + 'static {
    /// Backend table this record type lives in
    fn table() -> &'static str;

    /// Unique id within the table
    fn id(&self) -> &str;

    /// Decode a raw backend row
    fn decode(row: &Value) -> Result<Self, DecodeError>;
}

/// Equality predicate on a single row field
///
/// The backend contract only supports equality on scope fields, so there is
/// no operator enum here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    /// Predicate `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Single-key ordering applied by the backend to bulk fetches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Extract the string `id` field from a raw row
pub fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// True when the row satisfies every filter
pub fn row_matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| field_eq(row, &f.field, &f.value))
}

fn field_eq(row: &Value, field: &str, value: &str) -> bool {
    match row.get(field) {
        Some(Value::String(s)) => s == value,
        Some(Value::Number(n)) => n.to_string() == value,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_eq_constructor() {
        let filter = Filter::eq("event_id", "ev-1");
        assert_eq!(filter.field, "event_id");
        assert_eq!(filter.value, "ev-1");
    }

    #[test]
    fn test_row_matches_all_filters() {
        let row = json!({"id": "g1", "company_id": "acme", "event_id": "ev-1"});
        let filters = vec![Filter::eq("company_id", "acme"), Filter::eq("event_id", "ev-1")];
        assert!(row_matches(&row, &filters));
    }

    #[test]
    fn test_row_matches_rejects_mismatch() {
        let row = json!({"id": "g1", "company_id": "acme", "event_id": "ev-2"});
        let filters = vec![Filter::eq("company_id", "acme"), Filter::eq("event_id", "ev-1")];
        assert!(!row_matches(&row, &filters));
    }

    #[test]
    fn test_row_matches_missing_field() {
        let row = json!({"id": "i1", "event_id": "ev-1"});
        assert!(!row_matches(&row, &[Filter::eq("company_id", "acme")]));
    }

    #[test]
    fn test_row_matches_empty_filters() {
        let row = json!({"id": "x"});
        assert!(row_matches(&row, &[]));
    }

    #[test]
    fn test_row_matches_numeric_field() {
        let row = json!({"id": "x", "seq": 42});
        assert!(row_matches(&row, &[Filter::eq("seq", "42")]));
        assert!(!row_matches(&row, &[Filter::eq("seq", "43")]));
    }

    #[test]
    fn test_row_id() {
        assert_eq!(row_id(&json!({"id": "g1"})), Some("g1"));
        assert_eq!(row_id(&json!({"id": 7})), None);
        assert_eq!(row_id(&json!({"name": "no id"})), None);
    }
}
