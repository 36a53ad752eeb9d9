//! Match store implementation in-memory. For testing only.

use super::api::{MatchEvent, MatchStore, Result};
use crate::types::{MatchId, MatchState, MatchStatus, Order, OrderMatch};
use alloy::primitives::B256;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// [`MatchStore`] implementation in-memory. Used for testing.
///
/// Mutations notify every live subscriber with the resulting active-set change.
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: DashMap<MatchId, OrderMatch>,
    orders: DashMap<B256, Order>,
    subscribers: DashMap<u64, mpsc::UnboundedSender<MatchEvent>>,
    next_subscriber: AtomicU64,
}

impl InMemoryMatchStore {
    /// Inserts an order document.
    pub fn insert_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    /// Inserts or replaces a match document, notifying subscribers of the active-set change.
    pub fn upsert_match(&self, id: MatchId, order_match: OrderMatch) {
        let is_active = order_match.state.status == MatchStatus::Active;
        let was_active = self
            .matches
            .insert(id.clone(), order_match.clone())
            .is_some_and(|prev| prev.state.status == MatchStatus::Active);

        match (was_active, is_active) {
            (false, true) => self.notify(MatchEvent::Added(id, order_match)),
            (true, true) => self.notify(MatchEvent::Modified(id, order_match)),
            (true, false) => self.notify(MatchEvent::Removed(id)),
            (false, false) => {}
        }
    }

    /// Reads a match document.
    pub fn get_match(&self, id: &MatchId) -> Option<OrderMatch> {
        self.matches.get(id).map(|entry| entry.value().clone())
    }

    fn notify(&self, event: MatchEvent) {
        self.subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn subscribe_active(&self) -> Result<mpsc::UnboundedReceiver<MatchEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        for entry in self.matches.iter() {
            if entry.state.status == MatchStatus::Active {
                let _ = tx.send(MatchEvent::Added(entry.key().clone(), entry.value().clone()));
            }
        }
        self.subscribers.insert(self.next_subscriber.fetch_add(1, Ordering::Relaxed), tx);
        Ok(rx)
    }

    async fn read_orders(&self, ids: &[B256]) -> Result<Vec<Option<Order>>> {
        Ok(ids.iter().map(|id| self.orders.get(id).map(|order| order.value().clone())).collect())
    }

    async fn delete_match(&self, id: &MatchId) -> Result<()> {
        let removed_active = self
            .matches
            .remove(id)
            .is_some_and(|(_, prev)| prev.state.status == MatchStatus::Active);
        if removed_active {
            self.notify(MatchEvent::Removed(id.clone()));
        }
        Ok(())
    }

    async fn merge_state(&self, id: &MatchId, state: &MatchState) -> Result<()> {
        let (was_active, is_active, merged);
        {
            let Some(mut entry) = self.matches.get_mut(id) else { return Ok(()) };
            was_active = entry.state.status == MatchStatus::Active;

            entry.state.status = state.status;
            if let Some(code) = state.code {
                entry.state.code = Some(code);
            }
            if let Some(error) = &state.error {
                entry.state.error = Some(error.clone());
            }
            if let Some(message) = &state.message {
                entry.state.message = Some(message.clone());
            }

            is_active = entry.state.status == MatchStatus::Active;
            merged = entry.value().clone();
        }

        match (was_active, is_active) {
            (false, true) => self.notify(MatchEvent::Added(id.clone(), merged)),
            (true, true) => self.notify(MatchEvent::Modified(id.clone(), merged)),
            (true, false) => self.notify(MatchEvent::Removed(id.clone())),
            (false, false) => {}
        }
        Ok(())
    }
}
