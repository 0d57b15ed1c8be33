//! Fixture files
//!
//! A fixture is a YAML document holding raw backend rows per table, used to
//! run the CLI against a seeded in-memory backend. Rows are kept as raw
//! values on purpose: fixtures exercise the same decode path live feeds do,
//! malformed rows included.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use livestore::MemoryBackend;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::ScopeConfig;

/// Sample fixture bundled with the binary
pub const SAMPLE_FIXTURE: &str = include_str!("../fixtures/sample-event.yml");

/// Raw rows per table, plus the scope they belong to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Scope the fixture's rows belong to; used when neither the CLI nor
    /// the config selects one
    pub scope: ScopeConfig,

    pub guests: Vec<Value>,

    #[serde(rename = "itinerary-items")]
    pub itinerary_items: Vec<Value>,

    #[serde(rename = "timeline-modules")]
    pub timeline_modules: Vec<Value>,
}

impl Fixture {
    /// Load a fixture from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .context(format!("Failed to read fixture {}", path.as_ref().display()))?;
        let fixture: Self =
            serde_yaml::from_str(&content).context("Failed to parse fixture file")?;
        info!(
            path = %path.as_ref().display(),
            guests = fixture.guests.len(),
            items = fixture.itinerary_items.len(),
            modules = fixture.timeline_modules.len(),
            "Loaded fixture"
        );
        Ok(fixture)
    }

    /// The sample fixture bundled with the binary
    pub fn sample() -> Result<Self> {
        serde_yaml::from_str(SAMPLE_FIXTURE).context("Failed to parse bundled sample fixture")
    }

    /// Seed a fresh in-memory backend with this fixture's rows
    pub fn into_backend(self, feed_capacity: usize) -> Arc<MemoryBackend> {
        let backend = MemoryBackend::new(feed_capacity);
        backend.seed("guests", self.guests);
        backend.seed("itinerary_items", self.itinerary_items);
        backend.seed("timeline_modules", self.timeline_modules);
        Arc::new(backend)
    }
}
