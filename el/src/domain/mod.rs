//! Domain types for Eventline
//!
//! Core domain types: Guest, ItineraryItem, TimelineModule
//! All implement the LiveRecord trait for livestore mirroring, plus
//! ScopedRecord to declare how each type is filtered and ordered
//! within a `(company, event)` scope.

mod guest;
mod itinerary;
mod module;
mod scope;

pub use guest::{Guest, RsvpStatus};
pub use itinerary::ItineraryItem;
pub use module::{ModuleType, TimelineModule};
pub use scope::{ScopeKey, ScopedRecord};

// Re-export livestore types for convenience
pub use livestore::{ChangeEvent, ChangeKind, Filter, LiveRecord, OrderBy, OrderPolicy};
