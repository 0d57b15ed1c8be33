//! Clock ticker
//!
//! Drives the timeline engine with wall-clock ticks on a fixed cadence.
//! Status boundaries resolve at minute granularity, so the default cadence
//! is one minute; the engine handles date rollover itself when a tick
//! crosses midnight.

use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use super::engine::TimelineEngine;

/// Default tick cadence
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// The ClockTicker feeds the engine the current local time on a cadence
pub struct ClockTicker {
    engine: TimelineEngine,
    interval: Duration,
}

impl ClockTicker {
    /// Create a new ClockTicker
    pub fn new(engine: TimelineEngine, interval: Duration) -> Self {
        debug!(interval_secs = interval.as_secs(), "ClockTicker::new: created");
        Self { engine, interval }
    }

    /// Create a new ClockTicker with the default cadence
    pub fn with_default_interval(engine: TimelineEngine) -> Self {
        Self::new(engine, DEFAULT_TICK_INTERVAL)
    }

    /// Send a single tick carrying the current local time (useful for testing)
    pub async fn tick_once(&self) {
        let now = Local::now().naive_local();
        if let Err(e) = self.engine.tick(now).await {
            warn!(error = %e, "tick_once: engine unavailable");
        }
    }

    /// Run the ticker loop
    ///
    /// This runs until the engine is disposed. The first tick fires
    /// immediately so a fresh view never waits a full interval.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "ClockTicker started"
        );

        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            let now = Local::now().naive_local();
            if self.engine.tick(now).await.is_err() {
                debug!("run: engine disposed, stopping ticker");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScopeKey;
    use chrono::NaiveDate;
    use livestore::MemoryBackend;
    use std::sync::Arc;

    fn spawn_engine() -> TimelineEngine {
        let backend = Arc::new(MemoryBackend::default());
        let scope = ScopeKey::new("acme", "launch-day").unwrap();
        let now = Local::now().naive_local();
        TimelineEngine::for_scope(backend, scope, now.date(), now)
    }

    #[tokio::test]
    async fn test_tick_once_advances_engine_now() {
        let engine = spawn_engine();
        let frozen = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        engine.tick(frozen).await.unwrap();
        assert_eq!(engine.view().await.unwrap().now, frozen);

        let ticker = ClockTicker::with_default_interval(engine.clone());
        ticker.tick_once().await;
        assert!(engine.view().await.unwrap().now > frozen);
    }

    #[tokio::test]
    async fn test_run_stops_when_engine_is_disposed() {
        let engine = spawn_engine();
        let ticker = ClockTicker::new(engine.clone(), Duration::from_millis(10));
        let handle = tokio::spawn(ticker.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        engine.dispose().await;

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("ticker did not stop")
            .unwrap();
    }
}
