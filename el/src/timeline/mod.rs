//! Day timeline composition and live recomputation
//!
//! `compose` turns one day's records into ordered entries, `status`
//! classifies them against the clock, and the engine actor keeps a
//! composed view current as the mirrors and the clock move.

mod clock;
mod compose;
mod engine;
mod status;

pub use clock::{ClockTicker, DEFAULT_TICK_INTERVAL};
pub use compose::{EntryKind, TimelineEntry, compose_timeline, day_position, parse_time_of_day};
pub use engine::{
    EngineError, EngineEvent, EngineResponse, PositionedEntry, TimelineEngine, TimelineView,
};
pub use status::{EntryStatus, classify};
