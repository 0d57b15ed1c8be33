//! Ordered in-memory mirror for one scoped collection
//!
//! An `EntityStore` holds a map keyed by record id plus a derived id order;
//! the externally observed list is the order applied to the map, so no two
//! records ever share an id. Live feed events go through `apply`, bulk fetch
//! results through `reset`, and the merge rules reconcile the race between
//! the two.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::event::ChangeEvent;
use crate::record::LiveRecord;

/// Where live inserts land in the observed order
///
/// Fixed per collection at construction: most-recent-first collections
/// prepend, everything else appends. Updates never move a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    NewestFirst,
    Append,
}

/// Id-keyed record map with a derived order
#[derive(Debug)]
pub struct EntityStore<T> {
    records: HashMap<String, T>,
    order: Vec<String>,
    policy: OrderPolicy,
}

impl<T: LiveRecord> EntityStore<T> {
    /// Empty store with a fixed ordering policy
    pub fn new(policy: OrderPolicy) -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    /// Apply one live change event
    ///
    /// Returns whether the observed list may have changed, which drives
    /// change notifications. Duplicate deliveries and events for records the
    /// mirror has never seen are absorbed here:
    ///
    /// - insert for an existing id replaces the data in place
    /// - update or delete for an absent id is a no-op
    pub fn apply(&mut self, event: ChangeEvent<T>) -> bool {
        match event {
            ChangeEvent::Insert(record) => {
                let id = record.id().to_string();
                if self.records.insert(id.clone(), record).is_some() {
                    debug!(table = T::table(), %id, "insert for existing id applied as update");
                } else {
                    match self.policy {
                        OrderPolicy::NewestFirst => self.order.insert(0, id),
                        OrderPolicy::Append => self.order.push(id),
                    }
                }
                true
            }
            ChangeEvent::Update(record) => match self.records.entry(record.id().to_string()) {
                Entry::Occupied(mut entry) => {
                    entry.insert(record);
                    true
                }
                Entry::Vacant(entry) => {
                    debug!(table = T::table(), id = %entry.key(), "update for unknown id ignored");
                    false
                }
            },
            ChangeEvent::Delete { id } => {
                if self.records.remove(&id).is_some() {
                    self.order.retain(|existing| existing != &id);
                    true
                } else {
                    debug!(table = T::table(), %id, "delete for unknown id ignored");
                    false
                }
            }
        }
    }

    /// Replace the collection with a bulk fetch result, merging by id
    ///
    /// Never a blind overwrite: records applied from the live feed while the
    /// fetch was in flight survive. On an id collision the in-memory version
    /// wins, since the snapshot row was computed no later than the live
    /// event's write. Fetched rows define the base order; live-only records
    /// keep the policy position.
    pub fn reset(&mut self, records: Vec<T>) {
        let fetched = records.len();
        let mut merged: HashMap<String, T> = HashMap::with_capacity(fetched);
        let mut fetched_order: Vec<String> = Vec::with_capacity(fetched);

        for record in records {
            let id = record.id().to_string();
            if merged.contains_key(&id) {
                debug!(table = T::table(), %id, "duplicate id in fetch result dropped");
                continue;
            }
            let kept = self.records.remove(&id).unwrap_or(record);
            fetched_order.push(id.clone());
            merged.insert(id, kept);
        }

        // whatever is left arrived live and was missing from the snapshot
        let mut live_order: Vec<String> = Vec::new();
        for id in self.order.drain(..) {
            if let Some(record) = self.records.remove(&id) {
                live_order.push(id.clone());
                merged.insert(id, record);
            }
        }
        let live = live_order.len();

        self.order = match self.policy {
            OrderPolicy::NewestFirst => {
                live_order.extend(fetched_order);
                live_order
            }
            OrderPolicy::Append => {
                fetched_order.extend(live_order);
                fetched_order
            }
        };
        self.records = merged;

        debug!(
            table = T::table(),
            fetched,
            live,
            total = self.order.len(),
            "reset merged fetch result"
        );
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Records in observed order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Cloned records in observed order
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
