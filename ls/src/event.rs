//! Change-feed event types
//!
//! Feeds deliver `RowEvent`s (kind + raw row). Collections decode them into
//! typed `ChangeEvent`s before applying them to a store. Delete events only
//! need the row id, so they decode even when the backend sends a minimal row.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{DecodeError, LiveRecord, row_id};

/// Kind of mutation a feed event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Wire-level feed event: a mutation kind plus the raw row
#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub kind: ChangeKind,
    pub row: Value,
}

impl RowEvent {
    pub fn new(kind: ChangeKind, row: Value) -> Self {
        Self { kind, row }
    }

    pub fn insert(row: Value) -> Self {
        Self::new(ChangeKind::Insert, row)
    }

    pub fn update(row: Value) -> Self {
        Self::new(ChangeKind::Update, row)
    }

    pub fn delete(row: Value) -> Self {
        Self::new(ChangeKind::Delete, row)
    }

    /// The row's id, when present
    pub fn row_id(&self) -> Option<&str> {
        row_id(&self.row)
    }

    /// Decode into a typed change event
    ///
    /// Inserts and updates decode the full record; deletes only extract the
    /// id, since a backend may not replay the full row for a removal.
    pub fn decode<T: LiveRecord>(&self) -> Result<ChangeEvent<T>, DecodeError> {
        match self.kind {
            ChangeKind::Insert => Ok(ChangeEvent::Insert(T::decode(&self.row)?)),
            ChangeKind::Update => Ok(ChangeEvent::Update(T::decode(&self.row)?)),
            ChangeKind::Delete => {
                let id = self.row_id().ok_or(DecodeError::MissingId)?;
                Ok(ChangeEvent::Delete { id: id.to_string() })
            }
        }
    }
}

/// Typed change event ready to apply to an `EntityStore`
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

impl<T: LiveRecord> ChangeEvent<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update(_) => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Id of the record this event targets
    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => record.id(),
            ChangeEvent::Delete { id } => id,
        }
    }
}
