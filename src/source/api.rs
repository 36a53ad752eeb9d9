use crate::{
    error::SourceError,
    types::{MatchId, MatchState, Order, OrderMatch},
};
use alloy::primitives::B256;
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc;

/// Type alias for `Result<T, SourceError>`
pub type Result<T> = core::result::Result<T, SourceError>;

/// A change to the set of active matches.
#[derive(Debug, Clone)]
pub enum MatchEvent {
    /// A match entered the active set. The initial snapshot is delivered as `Added` events.
    Added(MatchId, OrderMatch),
    /// An active match document changed.
    Modified(MatchId, OrderMatch),
    /// A match left the active set.
    Removed(MatchId),
}

impl MatchEvent {
    /// The match the event concerns.
    pub fn id(&self) -> &MatchId {
        match self {
            Self::Added(id, _) | Self::Modified(id, _) | Self::Removed(id) => id,
        }
    }
}

/// Match datastore API.
///
/// The store holds `orderMatches` documents keyed by id, plus the signed orders they reference.
/// A subscription delivers the current active set as [`MatchEvent::Added`] events followed by
/// incremental changes; the receiver closing signals a broken transport.
#[async_trait]
pub trait MatchStore: Debug + Send + Sync {
    /// Opens a subscription over matches with [`Active`](crate::types::MatchStatus::Active)
    /// status.
    async fn subscribe_active(&self) -> Result<mpsc::UnboundedReceiver<MatchEvent>>;

    /// Reads the orders with the given ids in one batched read.
    ///
    /// The result is positional; a missing order yields `None` at its position.
    async fn read_orders(&self, ids: &[B256]) -> Result<Vec<Option<Order>>>;

    /// Deletes a match document. Deleting a missing document is a no-op.
    async fn delete_match(&self, id: &MatchId) -> Result<()>;

    /// Merge-updates the `state` field of a match document: the new status always applies, set
    /// optional fields overwrite, unset ones are left alone.
    ///
    /// Merging into a missing document is a no-op, which keeps the write idempotent against a
    /// concurrent delete.
    async fn merge_state(&self, id: &MatchId, state: &MatchState) -> Result<()>;
}
