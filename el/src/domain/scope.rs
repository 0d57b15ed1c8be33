//! Scope identity
//!
//! Every mirrored collection belongs to exactly one `(company, event)` pair.
//! A scope change is never an in-place re-point: the old collections are
//! disposed and new ones constructed for the new key.

use std::fmt;

use livestore::{Filter, LiveRecord, OrderBy, OrderPolicy};
use serde::{Deserialize, Serialize};

/// Identity of one event's data partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub company_id: String,
    pub event_id: String,
}

impl ScopeKey {
    /// Build a scope key; both ids must be non-empty
    pub fn new(company_id: impl Into<String>, event_id: impl Into<String>) -> Option<Self> {
        let company_id = company_id.into();
        let event_id = event_id.into();
        if company_id.is_empty() || event_id.is_empty() {
            return None;
        }
        Some(Self { company_id, event_id })
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.company_id, self.event_id)
    }
}

/// Per-type sync policy for records mirrored within a scope
///
/// Each record type decides which backend filters select its slice of the
/// table, how the bulk fetch is ordered, and where live inserts land in
/// the mirror. Records arriving over the feed are re-checked with
/// [`ScopedRecord::in_scope`] before admission, since a feed can outlive
/// the exact filter set it was opened with.
pub trait ScopedRecord: LiveRecord {
    /// Backend filters selecting this scope's rows
    fn scope_filters(scope: &ScopeKey) -> Vec<Filter>;

    /// Ordering the backend applies to the bulk fetch
    fn fetch_order() -> OrderBy;

    /// Where live inserts land relative to fetched rows
    fn order_policy() -> OrderPolicy;

    /// Whether a decoded record belongs to the scope
    fn in_scope(&self, scope: &ScopeKey) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_key_new() {
        let scope = ScopeKey::new("acme", "launch-day").unwrap();
        assert_eq!(scope.company_id, "acme");
        assert_eq!(scope.event_id, "launch-day");
    }

    #[test]
    fn test_scope_key_rejects_empty_ids() {
        assert!(ScopeKey::new("", "launch-day").is_none());
        assert!(ScopeKey::new("acme", "").is_none());
    }

    #[test]
    fn test_scope_key_display() {
        let scope = ScopeKey::new("acme", "launch-day").unwrap();
        assert_eq!(scope.to_string(), "acme/launch-day");
    }
}
