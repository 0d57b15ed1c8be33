//! Real-time mirroring with actor pattern
//!
//! Each LiveCollection owns an EntityStore and a change feed for one scoped
//! slice of a backend table, and processes commands via channels.

mod collection;
mod messages;

pub use collection::{CollectionEvent, LiveCollection};
pub use messages::{CollectionCommand, CollectionError, CollectionResponse, LoadState};
