//! LiveStore - live in-memory mirrors of server-owned record collections
//!
//! A mirror never originates authoritative writes. It bulk-fetches a scoped
//! slice of a backend table, subscribes to that table's change feed, and
//! reconciles the two into one ordered, deduplicated view:
//!
//! - **At-least-once feeds**: apply semantics absorb duplicate and early
//!   deliveries (insert-for-existing becomes an update, update/delete for an
//!   unknown id is a no-op)
//! - **Merge on reset**: a bulk fetch result is merged by id into the live
//!   state, never blindly overwriting records that arrived mid-fetch
//! - **Fixed ordering**: each collection prepends or appends live inserts,
//!   chosen once at construction
//!
//! # Modules
//!
//! - [`record`] - record contract, filters, row predicates
//! - [`event`] - feed event types, wire and typed
//! - [`store`] - the ordered entity store
//! - [`feed`] - subscription handles
//! - [`client`] - backend client trait
//! - [`memory`] - in-process backend for tests and demos

pub mod client;
pub mod event;
pub mod feed;
pub mod memory;
pub mod record;
pub mod store;

pub use client::{ClientError, TableClient};
pub use event::{ChangeEvent, ChangeKind, RowEvent};
pub use feed::{DEFAULT_FEED_CAPACITY, FeedError, FeedSubscription};
pub use memory::MemoryBackend;
pub use record::{DecodeError, Filter, LiveRecord, OrderBy, row_id, row_matches};
pub use store::{EntityStore, OrderPolicy};
