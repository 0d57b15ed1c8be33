//! Live collection messages
//!
//! Commands and responses for the actor pattern.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from collection operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The collection has been disposed; its actor is gone
    #[error("Collection disposed")]
    Disposed,

    #[error("Channel error")]
    ChannelError,
}

/// Response from collection operations
pub type CollectionResponse<T> = Result<T, CollectionError>;

/// Lifecycle state of a live collection
///
/// `Loading` and `Failed` describe the bulk fetch; live feed changes keep
/// applying in both. `Stale` means the feed lagged or closed, so the mirror
/// may be missing changes until the next refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
    Stale,
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Loading => write!(f, "loading"),
            LoadState::Ready => write!(f, "ready"),
            LoadState::Failed(reason) => write!(f, "failed: {}", reason),
            LoadState::Stale => write!(f, "stale"),
        }
    }
}

/// Commands sent to a LiveCollection actor
#[derive(Debug)]
pub enum CollectionCommand<T> {
    /// Current mirror contents in collection order
    Snapshot {
        reply: oneshot::Sender<CollectionResponse<Vec<T>>>,
    },

    /// Current load state
    State {
        reply: oneshot::Sender<CollectionResponse<LoadState>>,
    },

    /// Drop the feed, resubscribe and refetch
    Refresh {
        reply: oneshot::Sender<CollectionResponse<()>>,
    },

    /// Tear down the collection; idempotent
    Dispose,
}
