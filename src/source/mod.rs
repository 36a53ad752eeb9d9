//! Event-driven provider over the match datastore.

mod api;
pub use api::{MatchEvent, MatchStore, Result};

mod memory;
pub use memory::InMemoryMatchStore;

use crate::{
    constants::{SUBSCRIBE_BACKOFF_INITIAL, SUBSCRIBE_BACKOFF_MAX},
    error::Rejection,
    types::{MatchId, MatchState},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Streaming provider of active-match events, with write-backs for their lifecycle.
///
/// Wraps a [`MatchStore`] subscription with indefinite retry: transport errors and closed
/// subscriptions are retried with exponential backoff, and each resubscription re-delivers the
/// active snapshot. Duplicate `Added` events are harmless since the executor overwrites queued
/// work by id.
#[derive(Debug)]
pub struct MatchSource<S> {
    store: Arc<S>,
}

impl<S> Clone for MatchSource<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S: MatchStore + 'static> MatchSource<S> {
    /// Creates a new [`MatchSource`] over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Opens the event stream.
    ///
    /// Resolves once the first subscription is established, with the initial active snapshot
    /// delivered as the first events. A forwarding task keeps the stream alive across transport
    /// failures for as long as the receiver is held.
    pub async fn start(&self) -> mpsc::UnboundedReceiver<MatchEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events = Self::subscribe(&self.store).await;
        let store = self.store.clone();

        tokio::spawn(async move {
            loop {
                while let Some(event) = events.recv().await {
                    if tx.send(event).is_err() {
                        // Consumer gone, stop forwarding.
                        return;
                    }
                }
                warn!("match subscription closed, resubscribing");
                events = Self::subscribe(&store).await;
            }
        });

        rx
    }

    /// Subscribes to the store, retrying transport errors indefinitely with backoff.
    async fn subscribe(store: &S) -> mpsc::UnboundedReceiver<MatchEvent> {
        let mut backoff = SUBSCRIBE_BACKOFF_INITIAL;
        loop {
            match store.subscribe_active().await {
                Ok(events) => return events,
                Err(err) => {
                    warn!(%err, retry_in = ?backoff, "match subscription failed");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(SUBSCRIBE_BACKOFF_MAX);
                }
            }
        }
    }

    /// The match is fulfilled; removes the document.
    pub async fn on_completed(&self, id: &MatchId) -> Result<()> {
        debug!(%id, "match completed");
        self.store.delete_match(id).await
    }

    /// The bundle carrying the match reverted; removes the document so the match can be
    /// re-derived upstream if still valid.
    pub async fn on_reverted(&self, id: &MatchId) -> Result<()> {
        debug!(%id, "match reverted");
        self.store.delete_match(id).await
    }

    /// Persists a typed rejection on the match document.
    pub async fn on_invalidated(&self, id: &MatchId, rejection: &Rejection) -> Result<()> {
        debug!(%id, code = %rejection.code, "match invalidated");
        self.store.merge_state(id, &MatchState::rejected(rejection)).await
    }

    /// Merge-updates a partial state payload for intermediate telemetry.
    pub async fn on_progress(&self, id: &MatchId, state: &MatchState) -> Result<()> {
        self.store.merge_state(id, state).await
    }
}
