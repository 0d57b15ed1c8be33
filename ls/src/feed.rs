//! Change-feed subscription handles
//!
//! A `FeedSubscription` wraps a broadcast receiver for one table, filtered to
//! one scope. Delivery is at-least-once; the store's apply rules absorb
//! duplicates. Closing is idempotent, and dropping the handle releases it.

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::debug;
use uuid::Uuid;

use crate::event::RowEvent;
use crate::record::{Filter, row_matches};

/// Default capacity of a table's feed channel (events)
///
/// Feeds carry record mutations, not streams, so a modest buffer rides out
/// consumer pauses without holding much memory.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Why a feed stopped delivering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The channel dropped events the consumer never saw; the mirror may
    /// have gaps until it is refreshed
    #[error("feed lagged, {missed} events dropped")]
    Lagged { missed: u64 },

    /// The backend side of the feed went away
    #[error("feed closed")]
    Closed,
}

/// Handle to one table's change feed, filtered to one scope
pub struct FeedSubscription {
    id: String,
    table: String,
    filters: Vec<Filter>,
    rx: Option<broadcast::Receiver<RowEvent>>,
}

impl FeedSubscription {
    pub fn new(table: impl Into<String>, filters: Vec<Filter>, rx: broadcast::Receiver<RowEvent>) -> Self {
        let table = table.into();
        let id = subscription_id();
        debug!(%id, %table, filters = filters.len(), "feed subscription opened");
        Self {
            id,
            table,
            filters,
            rx: Some(rx),
        }
    }

    /// Short identifier for log correlation
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Next event matching this subscription's filters
    ///
    /// Events for rows outside the filters are skipped. After a `Lagged`
    /// error the subscription keeps delivering from the oldest retained
    /// event, so callers can flag staleness without tearing down the feed.
    pub async fn recv(&mut self) -> Result<RowEvent, FeedError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(FeedError::Closed);
        };
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if row_matches(&event.row, &self.filters) {
                        return Ok(event);
                    }
                    debug!(
                        id = %self.id,
                        table = %self.table,
                        kind = %event.kind,
                        "feed event outside filters skipped"
                    );
                }
                Err(RecvError::Lagged(missed)) => return Err(FeedError::Lagged { missed }),
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return Err(FeedError::Closed);
                }
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `Ok(None)` means no
    /// event is waiting
    pub fn try_recv(&mut self) -> Result<Option<RowEvent>, FeedError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(FeedError::Closed);
        };
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if row_matches(&event.row, &self.filters) {
                        return Ok(Some(event));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(missed)) => return Err(FeedError::Lagged { missed }),
                Err(TryRecvError::Closed) => {
                    self.rx = None;
                    return Err(FeedError::Closed);
                }
            }
        }
    }

    /// Release the subscription
    ///
    /// Safe to call any number of times; only the first call does anything.
    /// After closing, `recv` reports the feed as closed and no further
    /// events are delivered.
    pub fn close(&mut self) {
        if self.rx.take().is_some() {
            debug!(id = %self.id, table = %self.table, "feed subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

fn subscription_id() -> String {
    let hex = Uuid::now_v7().simple().to_string();
    format!("sub-{}", &hex[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scoped_event(id: &str, event_id: &str) -> RowEvent {
        RowEvent::insert(json!({"id": id, "event_id": event_id}))
    }

    #[tokio::test]
    async fn test_recv_delivers_matching_events() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = FeedSubscription::new("guests", vec![Filter::eq("event_id", "ev-1")], rx);

        tx.send(scoped_event("g1", "ev-1")).unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.row_id(), Some("g1"));
    }

    #[tokio::test]
    async fn test_recv_skips_other_scopes() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = FeedSubscription::new("guests", vec![Filter::eq("event_id", "ev-1")], rx);

        tx.send(scoped_event("other", "ev-2")).unwrap();
        tx.send(scoped_event("mine", "ev-1")).unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.row_id(), Some("mine"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_tx, rx) = broadcast::channel::<RowEvent>(16);
        let mut sub = FeedSubscription::new("guests", vec![], rx);

        assert!(!sub.is_closed());
        sub.close();
        assert!(sub.is_closed());
        sub.close();
        assert!(sub.is_closed());
    }

    #[tokio::test]
    async fn test_recv_after_close_reports_closed() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = FeedSubscription::new("guests", vec![], rx);

        tx.send(scoped_event("g1", "ev-1")).unwrap();
        sub.close();

        assert_eq!(sub.recv().await, Err(FeedError::Closed));
    }

    #[tokio::test]
    async fn test_recv_reports_closed_when_sender_drops() {
        let (tx, rx) = broadcast::channel::<RowEvent>(16);
        let mut sub = FeedSubscription::new("guests", vec![], rx);

        drop(tx);
        assert_eq!(sub.recv().await, Err(FeedError::Closed));
    }

    #[tokio::test]
    async fn test_recv_reports_lag_then_recovers() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = FeedSubscription::new("guests", vec![], rx);

        for n in 0..5 {
            tx.send(scoped_event(&format!("g{}", n), "ev-1")).unwrap();
        }

        match sub.recv().await {
            Err(FeedError::Lagged { missed }) => assert_eq!(missed, 3),
            other => panic!("expected lag, got {:?}", other),
        }

        // after the lag report the oldest retained event is delivered
        let event = sub.recv().await.unwrap();
        assert_eq!(event.row_id(), Some("g3"));
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let (_tx, rx) = broadcast::channel::<RowEvent>(16);
        let mut sub = FeedSubscription::new("guests", vec![], rx);
        assert_eq!(sub.try_recv().unwrap(), None);
    }
}
