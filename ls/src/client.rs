//! Backend client contract
//!
//! The mirror consumes exactly two operations per table: a bulk fetch and a
//! change-feed subscription. Anything that can serve those (an in-process
//! backend, a websocket gateway, a test double) plugs in behind this trait
//! and is held as `Arc<dyn TableClient>`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::feed::FeedSubscription;
use crate::record::{Filter, OrderBy};

/// Error from a backend operation
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Scoped read access to backend tables
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Bulk fetch of rows matching the filters, ordered by the backend
    async fn list(&self, table: &str, filters: &[Filter], order: &OrderBy) -> Result<Vec<Value>, ClientError>;

    /// Open a change feed delivering mutations for rows matching the filters
    async fn subscribe(&self, table: &str, filters: &[Filter]) -> Result<FeedSubscription, ClientError>;
}
