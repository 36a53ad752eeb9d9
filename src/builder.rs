//! Translates match documents into bundle items.

use crate::{
    error::BuildError,
    source::MatchStore,
    types::{
        BundleItem, MatchId, MatchOrdersItem, MatchType, OneToOneItem, OrderMatch,
        build_constructed_order, flatten_order_items,
    },
};
use alloy::primitives::{Address, ChainId};
use std::sync::Arc;

/// Builds [`BundleItem`]s from match documents, bound to one chain and exchange deployment.
#[derive(Debug)]
pub struct BundleItemBuilder<S> {
    store: Arc<S>,
    chain_id: ChainId,
    exchange: Address,
}

impl<S: MatchStore> BundleItemBuilder<S> {
    /// Creates a new [`BundleItemBuilder`].
    pub fn new(store: Arc<S>, chain_id: ChainId, exchange: Address) -> Self {
        Self { store, chain_id, exchange }
    }

    /// Resolves the match's orders and produces the bundle item for its execution path.
    ///
    /// Orders are fetched in one batched read and partitioned by side; a valid match resolves to
    /// exactly one listing and one offer on the executor's chain.
    pub async fn build(&self, id: &MatchId, order_match: &OrderMatch) -> Result<BundleItem, BuildError> {
        let orders = self.store.read_orders(&order_match.order_ids).await?;

        let (mut sells, mut buys) = (Vec::new(), Vec::new());
        for (order_id, order) in order_match.order_ids.iter().zip(orders) {
            let order = order.ok_or(BuildError::OrderMissing(*order_id))?;
            if order.is_sell_order { sells.push(order) } else { buys.push(order) }
        }

        if sells.len() > 1 || buys.len() > 1 {
            return Err(BuildError::MultipleOrdersUnsupported {
                listings: sells.len(),
                offers: buys.len(),
            });
        }
        let sell = sells.pop().ok_or(BuildError::MissingListing)?;
        let buy = buys.pop().ok_or(BuildError::MissingOffer)?;

        for order in [&sell, &buy] {
            if order.chain_id != self.chain_id {
                return Err(BuildError::ChainMismatch {
                    order: order.id,
                    actual: order.chain_id,
                    expected: self.chain_id,
                });
            }
        }

        let (sell_hash, buy_hash) = (sell.id, buy.id);
        Ok(match order_match.ty {
            MatchType::MatchOneToOneOrders => BundleItem::OneToOne(OneToOneItem {
                id: id.clone(),
                chain_id: self.chain_id,
                exchange: self.exchange,
                sell,
                buy,
                sell_hash,
                buy_hash,
            }),
            MatchType::MatchOrders => {
                let (nfts, num_matches) = flatten_order_items(&order_match.match_data);
                let constructed = build_constructed_order(&buy, nfts, num_matches);
                BundleItem::MatchOrders(MatchOrdersItem {
                    id: id.clone(),
                    chain_id: self.chain_id,
                    exchange: self.exchange,
                    sell,
                    buy,
                    sell_hash,
                    buy_hash,
                    constructed,
                })
            }
        })
    }
}
