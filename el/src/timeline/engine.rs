//! Timeline engine actor
//!
//! The engine owns the itinerary and module collections for one scope and
//! keeps a composed view of one day current. It recomputes whenever either
//! mirror changes, when the viewed date changes, and on every clock tick,
//! and broadcasts the fresh view to subscribers.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use livestore::TableClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use super::compose::{TimelineEntry, compose_timeline, day_position};
use super::status::{EntryStatus, classify};
use crate::domain::{ItineraryItem, ScopeKey, TimelineModule};
use crate::sync::{CollectionEvent, LiveCollection, LoadState};

/// Capacity of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the view broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors from engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine has been disposed; its actor is gone
    #[error("Engine disposed")]
    Disposed,

    #[error("Channel error")]
    ChannelError,
}

/// Response from engine operations
pub type EngineResponse<T> = Result<T, EngineError>;

/// One entry with its classification and day-relative layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedEntry {
    #[serde(flatten)]
    pub entry: TimelineEntry,
    pub status: EntryStatus,
    /// Percentage of the way through the day the entry starts
    pub position: f64,
    /// Percentage of the way through the day the entry ends
    pub end_position: f64,
}

/// The composed timeline for one day, as of one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineView {
    pub date: NaiveDate,
    pub now: NaiveDateTime,
    /// Position of the now marker, absent when viewing another day
    pub now_position: Option<f64>,
    pub entries: Vec<PositionedEntry>,
    pub items_state: LoadState,
    pub modules_state: LoadState,
}

impl TimelineView {
    /// Whether both underlying mirrors have completed their fetch
    pub fn is_ready(&self) -> bool {
        self.items_state.is_ready() && self.modules_state.is_ready()
    }
}

/// Events broadcast by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The composed view changed
    Recomputed { view: TimelineView },
}

/// Commands sent to the engine actor
#[derive(Debug)]
enum EngineCommand {
    View {
        reply: oneshot::Sender<EngineResponse<TimelineView>>,
    },
    SetDate {
        date: NaiveDate,
        reply: oneshot::Sender<EngineResponse<()>>,
    },
    Tick {
        now: NaiveDateTime,
        reply: oneshot::Sender<EngineResponse<()>>,
    },
    Shutdown,
}

/// Handle to send commands to the timeline engine
#[derive(Clone)]
pub struct TimelineEngine {
    tx: mpsc::Sender<EngineCommand>,
    /// Broadcast sender for view change notifications
    event_tx: broadcast::Sender<EngineEvent>,
}

impl TimelineEngine {
    /// Spawn an engine over already-running collections
    pub fn spawn(
        items: LiveCollection<ItineraryItem>,
        modules: LiveCollection<TimelineModule>,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Self {
        debug!(%date, %now, "spawn: called");
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let items_events = Some(items.subscribe_events());
        let modules_events = Some(modules.subscribe_events());
        let view = TimelineView {
            date,
            now,
            now_position: (now.date() == date).then(|| day_position(now, date)),
            entries: Vec::new(),
            items_state: LoadState::Loading,
            modules_state: LoadState::Loading,
        };

        let actor = EngineActor {
            items,
            modules,
            date,
            now,
            view,
            rx,
            items_events,
            modules_events,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(actor.run());

        Self { tx, event_tx }
    }

    /// Spawn an engine plus its two collections for one scope
    pub fn for_scope(
        client: Arc<dyn TableClient>,
        scope: ScopeKey,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Self {
        debug!(%scope, %date, "for_scope: called");
        let items = LiveCollection::spawn(client.clone(), scope.clone());
        let modules = LiveCollection::spawn(client, scope);
        Self::spawn(items, modules, date, now)
    }

    /// Subscribe to view change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// The current composed view
    pub async fn view(&self) -> EngineResponse<TimelineView> {
        debug!("view: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::View { reply: reply_tx })
            .await
            .map_err(|_| EngineError::Disposed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Switch the viewed day
    pub async fn set_date(&self, date: NaiveDate) -> EngineResponse<()> {
        debug!(%date, "set_date: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::SetDate {
                date,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::Disposed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Advance the engine's notion of now
    pub async fn tick(&self, now: NaiveDateTime) -> EngineResponse<()> {
        debug!(%now, "tick: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Tick {
                now,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::Disposed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Tear down the engine and the collections it owns
    ///
    /// Idempotent: later calls, and calls racing the teardown, are no-ops.
    pub async fn dispose(&self) {
        debug!("dispose: called");
        let _ = self.tx.send(EngineCommand::Shutdown).await;
    }
}

/// The actor side of the timeline engine
struct EngineActor {
    items: LiveCollection<ItineraryItem>,
    modules: LiveCollection<TimelineModule>,
    date: NaiveDate,
    now: NaiveDateTime,
    view: TimelineView,
    rx: mpsc::Receiver<EngineCommand>,
    items_events: Option<broadcast::Receiver<CollectionEvent>>,
    modules_events: Option<broadcast::Receiver<CollectionEvent>>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl EngineActor {
    async fn run(mut self) {
        debug!(date = %self.date, "run: timeline engine starting");
        self.recompute().await;

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("run: all handles dropped");
                        break;
                    };
                    match cmd {
                        EngineCommand::View { reply } => {
                            let _ = reply.send(Ok(self.view.clone()));
                        }
                        EngineCommand::SetDate { date, reply } => {
                            debug!(%date, "run: set_date");
                            self.date = date;
                            self.recompute().await;
                            let _ = reply.send(Ok(()));
                        }
                        EngineCommand::Tick { now, reply } => {
                            self.handle_tick(now).await;
                            let _ = reply.send(Ok(()));
                        }
                        EngineCommand::Shutdown => {
                            debug!("run: shutdown requested");
                            break;
                        }
                    }
                }

                event = Self::next_collection_event(&mut self.items_events) => {
                    if !self.handle_collection_event("itinerary_items", event).await {
                        self.items_events = None;
                    }
                }

                event = Self::next_collection_event(&mut self.modules_events) => {
                    if !self.handle_collection_event("timeline_modules", event).await {
                        self.modules_events = None;
                    }
                }
            }
        }

        // The engine owns its collections; they go down with it
        self.items.dispose().await;
        self.modules.dispose().await;
        debug!("run: timeline engine stopped");
    }

    /// Resolve to the next collection event, or never if the channel is gone
    async fn next_collection_event(
        events: &mut Option<broadcast::Receiver<CollectionEvent>>,
    ) -> Result<CollectionEvent, RecvError> {
        match events.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Returns false when the channel is gone and its branch must be disabled
    async fn handle_collection_event(
        &mut self,
        source: &str,
        event: Result<CollectionEvent, RecvError>,
    ) -> bool {
        match event {
            Ok(event) => {
                debug!(source, ?event, "handle_collection_event: mirror changed");
                self.recompute().await;
                true
            }
            Err(RecvError::Lagged(missed)) => {
                debug!(
                    source,
                    missed, "handle_collection_event: lagged behind, recomputing"
                );
                self.recompute().await;
                true
            }
            Err(RecvError::Closed) => {
                warn!(source, "handle_collection_event: event channel closed");
                false
            }
        }
    }

    async fn handle_tick(&mut self, now: NaiveDateTime) {
        // Viewing "today" follows the calendar across midnight; an
        // explicitly chosen other day stays put
        if self.date == self.now.date() && now.date() != self.now.date() {
            debug!(from = %self.date, to = %now.date(), "handle_tick: date rolled over");
            self.date = now.date();
        }
        self.now = now;
        self.recompute().await;
    }

    /// Rebuild the composed view and broadcast it
    async fn recompute(&mut self) {
        let (items, items_state) = match (
            self.items.snapshot().await,
            self.items.load_state().await,
        ) {
            (Ok(records), Ok(state)) => (records, state),
            _ => {
                warn!("recompute: item collection unavailable");
                return;
            }
        };
        let (modules, modules_state) = match (
            self.modules.snapshot().await,
            self.modules.load_state().await,
        ) {
            (Ok(records), Ok(state)) => (records, state),
            _ => {
                warn!("recompute: module collection unavailable");
                return;
            }
        };

        let entries = compose_timeline(self.date, &items, &modules)
            .into_iter()
            .map(|entry| self.position(entry))
            .collect::<Vec<_>>();

        debug!(
            date = %self.date,
            entry_count = entries.len(),
            "recompute: view rebuilt"
        );
        self.view = TimelineView {
            date: self.date,
            now: self.now,
            now_position: (self.now.date() == self.date)
                .then(|| day_position(self.now, self.date)),
            entries,
            items_state,
            modules_state,
        };
        self.broadcast(EngineEvent::Recomputed {
            view: self.view.clone(),
        });
    }

    fn position(&self, entry: TimelineEntry) -> PositionedEntry {
        let status = classify(&entry, self.now);
        let position = day_position(entry.start, self.date);
        let end_position = day_position(entry.end, self.date);
        PositionedEntry {
            entry,
            status,
            position,
            end_position,
        }
    }

    /// Fire-and-forget: no subscribers is fine
    fn broadcast(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}
