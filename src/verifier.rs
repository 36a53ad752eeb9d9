//! Exchange-side match verification and pricing.

use crate::{
    chain::ChainApi,
    error::{Rejection, RejectionCode},
    types::{BundleItem, PricedBundleItem, RejectedItem},
};
use alloy::primitives::U256;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Checks bundle items against the exchange contract and prices them.
#[derive(Debug)]
pub struct MatchVerifier<C> {
    chain: Arc<C>,
}

impl<C: ChainApi> MatchVerifier<C> {
    /// Creates a new [`MatchVerifier`].
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    /// Splits `items` into verified, priced items and typed rejections.
    ///
    /// Exchange calls run in parallel across the batch. A call that settles `false` or fails to
    /// settle at all rejects the item as no longer executable.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn verify(
        &self,
        items: Vec<BundleItem>,
        timestamp: u64,
    ) -> (Vec<PricedBundleItem>, Vec<RejectedItem>) {
        let results = join_all(items.into_iter().map(|item| async move {
            let outcome = self.verify_item(&item, timestamp).await;
            (item, outcome)
        }))
        .await;

        let (mut valid, mut rejected) = (Vec::new(), Vec::new());
        for (item, outcome) in results {
            match outcome {
                Ok(current_price) => valid.push(PricedBundleItem { item, current_price }),
                Err(rejection) => rejected.push(RejectedItem { item, rejection }),
            }
        }
        debug!(valid = valid.len(), rejected = rejected.len(), "verified batch");
        (valid, rejected)
    }

    async fn verify_item(&self, item: &BundleItem, timestamp: u64) -> Result<U256, Rejection> {
        match item {
            // The exchange exposes no one-to-one view call yet; accept the pair and settle at
            // the listing start price.
            BundleItem::OneToOne(item) => Ok(item.sell.constraints.start_price()),
            BundleItem::MatchOrders(item) => {
                match self
                    .chain
                    .verify_match_orders(item.sell_hash, item.buy_hash, &item.sell, &item.buy)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        return Err(Rejection::new(
                            RejectionCode::OrderInvalid,
                            "exchange rejected the order pair",
                        ));
                    }
                    Err(err) => {
                        return Err(Rejection::new(
                            RejectionCode::OrderInvalid,
                            format!("verification did not settle: {err}"),
                        ));
                    }
                }

                item.sell
                    .price_at(timestamp)
                    .zip(item.buy.price_at(timestamp))
                    .map(|(sell, buy)| sell.min(buy))
                    .ok_or_else(|| {
                        Rejection::new(RejectionCode::OrderInvalid, "order outside its price schedule")
                    })
            }
        }
    }
}
