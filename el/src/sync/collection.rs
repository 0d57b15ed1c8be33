//! Live collection actor
//!
//! A `LiveCollection` mirrors one scoped slice of a backend table. On spawn
//! it opens the change feed first and then starts the bulk fetch, so no
//! change can fall between the two. Feed changes apply immediately, even
//! while the fetch is in flight; the fetch result is merged around them
//! rather than replacing them. Fetch results are generation-tagged so a
//! late response can never clobber a newer reload.

use std::sync::Arc;

use livestore::{
    ChangeEvent, ChangeKind, ClientError, EntityStore, FeedError, FeedSubscription, RowEvent,
    TableClient,
};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{CollectionCommand, CollectionError, CollectionResponse, LoadState};
use crate::domain::{ScopeKey, ScopedRecord};

/// Capacity of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the per-collection event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the internal fetch outcome channel; at most a handful of
/// fetches can be in flight across refreshes
const FETCH_CHANNEL_CAPACITY: usize = 8;

/// Events broadcast by a collection after its mirror changes
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// One feed change mutated the mirror
    Applied { kind: ChangeKind, id: String },

    /// A fetch result was merged; `count` is the mirror size afterwards
    Reset { count: usize },

    /// Load state moved
    StateChanged { state: LoadState },
}

/// Outcome of one bulk fetch, tagged with the generation that started it
#[derive(Debug)]
struct FetchOutcome {
    generation: u64,
    result: Result<Vec<Value>, ClientError>,
}

/// Handle to send commands to a collection actor
#[derive(Clone)]
pub struct LiveCollection<T: ScopedRecord> {
    tx: mpsc::Sender<CollectionCommand<T>>,
    /// Broadcast sender for mirror change notifications
    event_tx: broadcast::Sender<CollectionEvent>,
}

impl<T: ScopedRecord> LiveCollection<T> {
    /// Spawn a new collection actor for one scope
    ///
    /// The actor subscribes and fetches immediately; the handle is usable
    /// at once and snapshots fill in as data arrives.
    pub fn spawn(client: Arc<dyn TableClient>, scope: ScopeKey) -> Self {
        debug!(table = T::table(), %scope, "spawn: called");
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (fetch_tx, fetch_rx) = mpsc::channel(FETCH_CHANNEL_CAPACITY);

        let actor = CollectionActor {
            client,
            scope,
            store: EntityStore::new(T::order_policy()),
            state: LoadState::Loading,
            generation: 0,
            feed: None,
            rx,
            fetch_tx,
            fetch_rx,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(actor.run());

        Self { tx, event_tx }
    }

    /// Subscribe to mirror change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<CollectionEvent> {
        self.event_tx.subscribe()
    }

    /// Current mirror contents in collection order
    pub async fn snapshot(&self) -> CollectionResponse<Vec<T>> {
        debug!(table = T::table(), "snapshot: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CollectionCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| CollectionError::Disposed)?;
        reply_rx.await.map_err(|_| CollectionError::ChannelError)?
    }

    /// Current load state
    pub async fn load_state(&self) -> CollectionResponse<LoadState> {
        debug!(table = T::table(), "load_state: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CollectionCommand::State { reply: reply_tx })
            .await
            .map_err(|_| CollectionError::Disposed)?;
        reply_rx.await.map_err(|_| CollectionError::ChannelError)?
    }

    /// Drop the current feed, resubscribe and refetch
    ///
    /// Returns once the reload has started; progress is observable through
    /// [`LiveCollection::load_state`] and the event stream.
    pub async fn refresh(&self) -> CollectionResponse<()> {
        debug!(table = T::table(), "refresh: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CollectionCommand::Refresh { reply: reply_tx })
            .await
            .map_err(|_| CollectionError::Disposed)?;
        reply_rx.await.map_err(|_| CollectionError::ChannelError)?
    }

    /// Tear down the collection and release its feed
    ///
    /// Idempotent: later calls, and calls racing the teardown, are no-ops.
    pub async fn dispose(&self) {
        debug!(table = T::table(), "dispose: called");
        let _ = self.tx.send(CollectionCommand::Dispose).await;
    }
}

/// The actor side of a live collection
struct CollectionActor<T: ScopedRecord> {
    client: Arc<dyn TableClient>,
    scope: ScopeKey,
    store: EntityStore<T>,
    state: LoadState,
    /// Bumped on every load; outcomes from older generations are ignored
    generation: u64,
    feed: Option<FeedSubscription>,
    rx: mpsc::Receiver<CollectionCommand<T>>,
    fetch_tx: mpsc::Sender<FetchOutcome>,
    fetch_rx: mpsc::Receiver<FetchOutcome>,
    event_tx: broadcast::Sender<CollectionEvent>,
}

impl<T: ScopedRecord> CollectionActor<T> {
    /// Run the actor until disposed or all handles are dropped
    async fn run(mut self) {
        debug!(table = T::table(), scope = %self.scope, "run: collection actor starting");
        self.begin_load().await;

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!(table = T::table(), "run: all handles dropped");
                        break;
                    };
                    match cmd {
                        CollectionCommand::Snapshot { reply } => {
                            let _ = reply.send(Ok(self.store.snapshot()));
                        }
                        CollectionCommand::State { reply } => {
                            let _ = reply.send(Ok(self.state.clone()));
                        }
                        CollectionCommand::Refresh { reply } => {
                            debug!(table = T::table(), "run: refresh requested");
                            self.release_feed();
                            self.begin_load().await;
                            let _ = reply.send(Ok(()));
                        }
                        CollectionCommand::Dispose => {
                            debug!(table = T::table(), "run: dispose requested");
                            break;
                        }
                    }
                }

                Some(outcome) = self.fetch_rx.recv() => {
                    self.handle_fetch_outcome(outcome);
                }

                event = Self::next_feed_event(&mut self.feed) => {
                    self.handle_feed_event(event);
                }
            }
        }

        self.release_feed();
        debug!(table = T::table(), scope = %self.scope, "run: collection actor stopped");
    }

    /// Resolve to the next feed delivery, or never if there is no feed
    async fn next_feed_event(feed: &mut Option<FeedSubscription>) -> Result<RowEvent, FeedError> {
        match feed.as_mut() {
            Some(sub) => sub.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Start one load: subscribe to the feed, then kick off the bulk fetch
    ///
    /// Subscribing first means a change committed right after the fetch
    /// snapshot still reaches us through the feed.
    async fn begin_load(&mut self) {
        self.generation += 1;
        self.set_state(LoadState::Loading);

        let filters = T::scope_filters(&self.scope);
        match self.client.subscribe(T::table(), &filters).await {
            Ok(sub) => {
                debug!(table = T::table(), sub_id = sub.id(), "begin_load: feed opened");
                self.feed = Some(sub);
            }
            Err(e) => {
                warn!(table = T::table(), error = %e, "begin_load: subscribe failed");
                self.feed = None;
            }
        }

        self.spawn_fetch();
    }

    /// Kick off the bulk fetch for the current generation on its own task
    fn spawn_fetch(&self) {
        let client = self.client.clone();
        let filters = T::scope_filters(&self.scope);
        let order = T::fetch_order();
        let generation = self.generation;
        let fetch_tx = self.fetch_tx.clone();

        debug!(table = T::table(), generation, "spawn_fetch: fetching");
        tokio::spawn(async move {
            let result = client.list(T::table(), &filters, &order).await;
            let _ = fetch_tx.send(FetchOutcome { generation, result }).await;
        });
    }

    fn handle_fetch_outcome(&mut self, outcome: FetchOutcome) {
        if outcome.generation != self.generation {
            debug!(
                table = T::table(),
                outcome_generation = outcome.generation,
                current_generation = self.generation,
                "handle_fetch_outcome: ignoring stale fetch response"
            );
            return;
        }

        match outcome.result {
            Ok(rows) => {
                let records = self.decode_rows(rows);
                self.store.reset(records);
                // A merge without a live feed is immediately behind
                let state = if self.feed.is_some() {
                    LoadState::Ready
                } else {
                    LoadState::Stale
                };
                self.set_state(state);
                let count = self.store.len();
                info!(table = T::table(), count, "handle_fetch_outcome: fetch merged");
                self.broadcast(CollectionEvent::Reset { count });
            }
            Err(e) => {
                // Records applied from the feed stay visible
                warn!(table = T::table(), error = %e, "handle_fetch_outcome: fetch failed");
                self.set_state(LoadState::Failed(e.to_string()));
            }
        }
    }

    /// Decode fetched rows, dropping malformed and out-of-scope ones
    fn decode_rows(&self, rows: Vec<Value>) -> Vec<T> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match T::decode(&row) {
                Ok(record) => {
                    if record.in_scope(&self.scope) {
                        records.push(record);
                    } else {
                        warn!(
                            table = T::table(),
                            id = record.id(),
                            "decode_rows: row outside scope dropped"
                        );
                    }
                }
                Err(e) => {
                    warn!(table = T::table(), error = %e, "decode_rows: malformed row excluded");
                }
            }
        }
        records
    }

    /// Handle one delivery from the change feed
    fn handle_feed_event(&mut self, event: Result<RowEvent, FeedError>) {
        match event {
            Ok(row_event) => self.apply_row_event(row_event),
            Err(FeedError::Lagged { missed }) => {
                warn!(
                    table = T::table(),
                    missed, "handle_feed_event: feed lagged, marking stale"
                );
                self.set_state(LoadState::Stale);
            }
            Err(FeedError::Closed) => {
                warn!(table = T::table(), "handle_feed_event: feed closed, marking stale");
                self.feed = None;
                self.set_state(LoadState::Stale);
            }
        }
    }

    fn apply_row_event(&mut self, row_event: RowEvent) {
        let kind = row_event.kind;
        let change = match row_event.decode::<T>() {
            Ok(change) => change,
            Err(e) => {
                warn!(table = T::table(), error = %e, "apply_row_event: malformed feed row excluded");
                return;
            }
        };

        // A feed can outlive the filter set it was opened with, so scope is
        // re-checked on admission. Deletes carry only an id and are admitted
        // by mirror membership instead.
        if let ChangeEvent::Insert(record) | ChangeEvent::Update(record) = &change {
            if !record.in_scope(&self.scope) {
                warn!(
                    table = T::table(),
                    id = record.id(),
                    "apply_row_event: record outside scope dropped"
                );
                return;
            }
        }

        let id = change.id().to_string();
        if self.store.apply(change) {
            debug!(table = T::table(), %id, ?kind, "apply_row_event: applied");
            self.broadcast(CollectionEvent::Applied { kind, id });
        }
    }

    /// Close and drop the current feed, if any
    fn release_feed(&mut self) {
        if let Some(mut sub) = self.feed.take() {
            debug!(table = T::table(), sub_id = sub.id(), "release_feed: closing feed");
            sub.close();
        }
    }

    fn set_state(&mut self, state: LoadState) {
        if self.state != state {
            debug!(
                table = T::table(),
                from = %self.state,
                to = %state,
                "set_state: transition"
            );
            self.state = state.clone();
            self.broadcast(CollectionEvent::StateChanged { state });
        }
    }

    /// Fire-and-forget: no subscribers is fine
    fn broadcast(&self, event: CollectionEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Guest;
    use livestore::MemoryBackend;
    use serde_json::json;
    use std::time::Duration;

    fn scope() -> ScopeKey {
        ScopeKey::new("acme", "launch-day").unwrap()
    }

    fn guest_row(id: &str, first_name: &str, created_at: &str) -> Value {
        json!({
            "id": id,
            "company_id": "acme",
            "event_id": "launch-day",
            "first_name": first_name,
            "last_name": "Test",
            "created_at": created_at,
        })
    }

    fn seeded_backend() -> Arc<MemoryBackend> {
        let backend = MemoryBackend::default();
        backend.seed(
            "guests",
            vec![
                guest_row("g1", "Ada", "2024-05-01T10:00:00Z"),
                guest_row("g2", "Grace", "2024-05-01T11:00:00Z"),
            ],
        );
        Arc::new(backend)
    }

    async fn wait_for_state<F>(collection: &LiveCollection<Guest>, what: &str, mut pred: F)
    where
        F: FnMut(&LoadState) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let state = collection.load_state().await.unwrap();
                if pred(&state) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
    }

    async fn wait_for_len(collection: &LiveCollection<Guest>, want: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if collection.snapshot().await.unwrap().len() == want {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} records", want));
    }

    fn ids(guests: &[Guest]) -> Vec<&str> {
        guests.iter().map(|g| g.id.as_str()).collect()
    }

    // === Load and merge ===

    #[tokio::test]
    async fn test_initial_fetch_populates_in_backend_order() {
        let backend = seeded_backend();
        let collection = LiveCollection::<Guest>::spawn(backend, scope());

        wait_for_state(&collection, "ready", LoadState::is_ready).await;
        let snapshot = collection.snapshot().await.unwrap();
        // created_at descending
        assert_eq!(ids(&snapshot), vec!["g2", "g1"]);
    }

    #[tokio::test]
    async fn test_live_insert_lands_in_front() {
        let backend = seeded_backend();
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());
        wait_for_state(&collection, "ready", LoadState::is_ready).await;

        backend.insert("guests", guest_row("g3", "Edsger", "2024-05-01T12:00:00Z"));
        wait_for_len(&collection, 3).await;

        let snapshot = collection.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["g3", "g2", "g1"]);
    }

    #[tokio::test]
    async fn test_live_update_and_delete_apply() {
        let backend = seeded_backend();
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());
        wait_for_state(&collection, "ready", LoadState::is_ready).await;

        backend.update("guests", guest_row("g1", "Augusta", "2024-05-01T10:00:00Z"));
        backend.delete("guests", "g2");
        wait_for_len(&collection, 1).await;

        let snapshot = collection.snapshot().await.unwrap();
        assert_eq!(snapshot[0].first_name, "Augusta");
    }

    #[tokio::test]
    async fn test_live_event_during_fetch_is_merged_without_duplicates() {
        let backend = seeded_backend();
        backend.set_list_delay(Some(Duration::from_millis(50)));
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());

        // Arrives over the feed while the fetch is still sleeping
        tokio::time::sleep(Duration::from_millis(10)).await;
        backend.insert("guests", guest_row("g3", "Edsger", "2024-05-01T12:00:00Z"));

        wait_for_state(&collection, "ready", LoadState::is_ready).await;
        let snapshot = collection.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["g3", "g2", "g1"]);
    }

    // === Failure handling ===

    #[tokio::test]
    async fn test_fetch_failure_keeps_live_records() {
        let backend = seeded_backend();
        backend.set_list_delay(Some(Duration::from_millis(30)));
        backend.fail_next_list("guests", "backend down");
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());

        tokio::time::sleep(Duration::from_millis(10)).await;
        backend.insert("guests", guest_row("g9", "Live", "2024-05-01T12:00:00Z"));

        wait_for_state(&collection, "failed", |s| matches!(s, LoadState::Failed(_))).await;
        let snapshot = collection.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["g9"]);

        // Refresh recovers and merges the seeded rows around the live one
        backend.set_list_delay(None);
        collection.refresh().await.unwrap();
        wait_for_state(&collection, "ready", LoadState::is_ready).await;
        let snapshot = collection.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["g9", "g2", "g1"]);
    }

    #[tokio::test]
    async fn test_stale_fetch_response_is_ignored() {
        let backend = seeded_backend();
        backend.set_list_delay(Some(Duration::from_millis(40)));
        backend.fail_next_list("guests", "transient");
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());
        let mut events = collection.subscribe_events();

        // Refresh before the failing fetch lands; its generation is now stale
        tokio::time::sleep(Duration::from_millis(10)).await;
        collection.refresh().await.unwrap();

        wait_for_state(&collection, "ready", LoadState::is_ready).await;

        // The superseded failure must not have surfaced
        let mut saw_failed = false;
        while let Ok(event) = events.try_recv() {
            if let CollectionEvent::StateChanged {
                state: LoadState::Failed(_),
            } = event
            {
                saw_failed = true;
            }
        }
        assert!(!saw_failed);
        assert_eq!(collection.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_feed_marks_stale_and_refresh_recovers() {
        let backend = seeded_backend();
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());
        wait_for_state(&collection, "ready", LoadState::is_ready).await;

        backend.close_feed("guests");
        wait_for_state(&collection, "stale", |s| matches!(s, LoadState::Stale)).await;

        // Missed while stale; the refetch picks it up
        backend.insert("guests", guest_row("g5", "Missed", "2024-05-01T12:00:00Z"));

        collection.refresh().await.unwrap();
        wait_for_state(&collection, "ready", LoadState::is_ready).await;
        wait_for_len(&collection, 3).await;

        // And the new feed is live again
        backend.insert("guests", guest_row("g6", "Back", "2024-05-01T13:00:00Z"));
        wait_for_len(&collection, 4).await;
    }

    // === Lifecycle ===

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_fails_later_calls() {
        let backend = seeded_backend();
        let collection = LiveCollection::<Guest>::spawn(backend, scope());
        wait_for_state(&collection, "ready", LoadState::is_ready).await;

        collection.dispose().await;
        collection.dispose().await;

        // The actor drains already queued commands before stopping, so give
        // the teardown a moment to land
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            collection.snapshot().await.unwrap_err(),
            CollectionError::Disposed
        );
        assert_eq!(
            collection.load_state().await.unwrap_err(),
            CollectionError::Disposed
        );
    }

    #[tokio::test]
    async fn test_events_announce_merge_and_apply() {
        let backend = seeded_backend();
        let collection = LiveCollection::<Guest>::spawn(backend.clone(), scope());
        let mut events = collection.subscribe_events();
        wait_for_state(&collection, "ready", LoadState::is_ready).await;

        backend.insert("guests", guest_row("g3", "Edsger", "2024-05-01T12:00:00Z"));
        wait_for_len(&collection, 3).await;

        let mut saw_reset = false;
        let mut saw_applied = false;
        while let Ok(event) = events.try_recv() {
            match event {
                CollectionEvent::Reset { count } => {
                    assert_eq!(count, 2);
                    saw_reset = true;
                }
                CollectionEvent::Applied { kind, id } => {
                    assert_eq!(kind, ChangeKind::Insert);
                    assert_eq!(id, "g3");
                    saw_applied = true;
                }
                CollectionEvent::StateChanged { .. } => {}
            }
        }
        assert!(saw_reset);
        assert!(saw_applied);
    }
}
