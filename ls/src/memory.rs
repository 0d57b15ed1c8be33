//! In-memory backend
//!
//! `MemoryBackend` serves the `TableClient` contract from process memory:
//! tables of raw rows behind a mutex and one broadcast feed per table.
//! Mutation helpers mirror the caller's intent onto the feed, so an `update`
//! for a row the backend never stored still emits an event, which is exactly
//! how a real feed can outrun a mirror's bulk fetch. Used by tests and the
//! demo CLI; a networked backend would implement the same trait.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::debug;

use crate::client::{ClientError, TableClient};
use crate::event::RowEvent;
use crate::feed::{DEFAULT_FEED_CAPACITY, FeedSubscription};
use crate::record::{Filter, OrderBy, row_id, row_matches};

pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    feeds: Mutex<HashMap<String, broadcast::Sender<RowEvent>>>,
    list_failures: Mutex<HashMap<String, String>>,
    list_delay: Mutex<Option<Duration>>,
    feed_capacity: usize,
}

impl MemoryBackend {
    pub fn new(feed_capacity: usize) -> Self {
        debug!(feed_capacity, "MemoryBackend::new");
        Self {
            tables: Mutex::new(HashMap::new()),
            feeds: Mutex::new(HashMap::new()),
            list_failures: Mutex::new(HashMap::new()),
            list_delay: Mutex::new(None),
            feed_capacity,
        }
    }

    /// Load rows without emitting feed events (initial data)
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        debug!(table, count = rows.len(), "seeding table");
        lock(&self.tables).entry(table.to_string()).or_default().extend(rows);
    }

    /// Insert a row and emit the matching feed event
    pub fn insert(&self, table: &str, row: Value) {
        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        self.emit(table, RowEvent::insert(row));
    }

    /// Update a row in place (matched by id) and emit the event
    ///
    /// The event is emitted even when no stored row matches; feeds deliver
    /// what happened on the backend, not what the mirror already knows.
    pub fn update(&self, table: &str, row: Value) {
        if let Some(id) = row_id(&row) {
            let mut tables = lock(&self.tables);
            if let Some(rows) = tables.get_mut(table) {
                if let Some(existing) = rows.iter_mut().find(|r| row_id(r) == Some(id)) {
                    *existing = row.clone();
                }
            }
        }
        self.emit(table, RowEvent::update(row));
    }

    /// Remove a row by id and emit a delete event
    ///
    /// The event carries the removed row when the backend had it, or a
    /// minimal id-only row otherwise.
    pub fn delete(&self, table: &str, id: &str) {
        let removed = {
            let mut tables = lock(&self.tables);
            tables.get_mut(table).and_then(|rows| {
                let at = rows.iter().position(|r| row_id(r) == Some(id));
                at.map(|at| rows.remove(at))
            })
        };
        let row = removed.unwrap_or_else(|| json!({ "id": id }));
        self.emit(table, RowEvent::delete(row));
    }

    /// Drop a table's feed, closing every open subscription on it
    ///
    /// Models the backend connection going away. A later `subscribe` opens a
    /// fresh feed.
    pub fn close_feed(&self, table: &str) {
        if lock(&self.feeds).remove(table).is_some() {
            debug!(table, "feed closed");
        }
    }

    /// Make the next `list` for this table fail (one-shot)
    pub fn fail_next_list(&self, table: &str, message: &str) {
        lock(&self.list_failures).insert(table.to_string(), message.to_string());
    }

    /// Delay every `list` call by the given duration (None clears)
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *lock(&self.list_delay) = delay;
    }

    fn emit(&self, table: &str, event: RowEvent) {
        debug!(table, kind = %event.kind, id = ?event.row_id(), "emitting feed event");
        let sender = self.sender_for(table);
        // no subscribers is fine
        let _ = sender.send(event);
    }

    fn sender_for(&self, table: &str) -> broadcast::Sender<RowEvent> {
        let mut feeds = lock(&self.feeds);
        feeds
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(self.feed_capacity).0)
            .clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[async_trait]
impl TableClient for MemoryBackend {
    async fn list(&self, table: &str, filters: &[Filter], order: &OrderBy) -> Result<Vec<Value>, ClientError> {
        let delay = *lock(&self.list_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = lock(&self.list_failures).remove(table) {
            debug!(table, "injected list failure");
            return Err(ClientError::RequestFailed(message));
        }

        let mut rows: Vec<Value> = {
            let tables = lock(&self.tables);
            tables
                .get(table)
                .map(|rows| rows.iter().filter(|r| row_matches(r, filters)).cloned().collect())
                .unwrap_or_default()
        };

        rows.sort_by(|a, b| {
            let ord = compare_field(a, b, &order.field);
            if order.descending { ord.reverse() } else { ord }
        });

        debug!(table, count = rows.len(), "list served");
        Ok(rows)
    }

    async fn subscribe(&self, table: &str, filters: &[Filter]) -> Result<FeedSubscription, ClientError> {
        let rx = self.sender_for(table).subscribe();
        Ok(FeedSubscription::new(table, filters.to_vec(), rx))
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    // a poisoned table mutex only means a panicking test mid-write; the data
    // is still the best copy there is
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn compare_field(a: &Value, b: &Value, field: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.get(field), b.get(field)) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
