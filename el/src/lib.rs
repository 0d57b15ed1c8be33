//! Eventline - live event timelines at the terminal
//!
//! Eventline mirrors one event's guests, itinerary and interactive modules
//! from a backend in real time and composes the itinerary side into a day
//! timeline with positions and statuses that track the clock.
//!
//! # Core Concepts
//!
//! - **Subscribe, then fetch**: every mirror opens its change feed before
//!   the bulk fetch, so no change falls between the two
//! - **Merge, never clobber**: fetch results merge around records that
//!   arrived live; a version already seen over the feed wins
//! - **One scope per collection**: switching event means disposing the old
//!   collections and spawning new ones, never re-pointing them
//! - **The clock is an input**: statuses and the now marker come from ticks
//!   fed to the engine, which makes rendering deterministic under test
//!
//! # Modules
//!
//! - [`domain`] - Guest, itinerary and module record types
//! - [`sync`] - Live collection actors mirroring scoped backend tables
//! - [`timeline`] - Day composition, status classification and the engine
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`fixture`] - Seedable fixture files for the in-memory backend

pub mod cli;
pub mod config;
pub mod domain;
pub mod fixture;
pub mod sync;
pub mod timeline;

// Re-export commonly used types
pub use config::{ClockConfig, Config, LogConfig, ScopeConfig, SyncConfig};
pub use domain::{
    ChangeEvent, ChangeKind, Guest, ItineraryItem, LiveRecord, ModuleType, RsvpStatus, ScopeKey,
    ScopedRecord, TimelineModule,
};
pub use fixture::Fixture;
pub use sync::{CollectionError, CollectionEvent, CollectionResponse, LiveCollection, LoadState};
pub use timeline::{
    ClockTicker, EngineError, EngineEvent, EngineResponse, EntryKind, EntryStatus, PositionedEntry,
    TimelineEngine, TimelineEntry, TimelineView, classify, compose_timeline, day_position,
};
