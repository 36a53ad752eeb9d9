//! On-chain asset validation: seller ownership and approval, buyer allowance and balance.

use crate::{
    chain::ChainApi,
    config::ValidationConfig,
    error::{Rejection, RejectionCode},
    types::{Nft, Order, PricedBundleItem, RejectedItem},
};
use alloy::primitives::{Address, U256};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Validates the assets behind priced bundle items.
///
/// Both passes only read chain state; ordering between them is immaterial and they run fused per
/// item.
#[derive(Debug)]
pub struct AssetValidator<C> {
    chain: Arc<C>,
    /// Wrapped-native ERC-20, always included in the buyer-side currency set.
    wrapped_native: Address,
    config: ValidationConfig,
}

impl<C: ChainApi> AssetValidator<C> {
    /// Creates a new [`AssetValidator`].
    pub fn new(chain: Arc<C>, wrapped_native: Address, config: ValidationConfig) -> Self {
        Self { chain, wrapped_native, config }
    }

    /// Splits `items` into items whose assets check out and typed rejections.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn validate(
        &self,
        items: Vec<PricedBundleItem>,
    ) -> (Vec<PricedBundleItem>, Vec<RejectedItem>) {
        let results = join_all(items.into_iter().map(|item| async move {
            let outcome = self.validate_item(&item).await;
            (item, outcome)
        }))
        .await;

        let (mut valid, mut rejected) = (Vec::new(), Vec::new());
        for (item, outcome) in results {
            match outcome {
                Ok(()) => valid.push(item),
                Err(rejection) => rejected.push(RejectedItem { item: item.item, rejection }),
            }
        }
        debug!(valid = valid.len(), rejected = rejected.len(), "validated batch");
        (valid, rejected)
    }

    async fn validate_item(&self, item: &PricedBundleItem) -> Result<(), Rejection> {
        let (seller, buyer) = tokio::join!(
            self.check_seller(item.item.sell().signer, item.item.exchange(), item.item.nfts()),
            self.check_buyer(item.item.buy(), item.item.exchange(), item.current_price),
        );
        seller.and(buyer)
    }

    /// Confirms operator approval on every collection and ownership of every token.
    async fn check_seller(
        &self,
        signer: Address,
        operator: Address,
        nfts: &[Nft],
    ) -> Result<(), Rejection> {
        for nft in nfts {
            let approved = self
                .chain
                .is_approved_for_all(nft.collection, signer, operator)
                .await
                .map_err(|err| err.to_rejection())?;
            if !approved {
                return Err(Rejection::new(
                    RejectionCode::NotApprovedToTransferToken,
                    format!("collection {} is not approved for the exchange operator", nft.collection),
                ));
            }

            for token in &nft.tokens {
                let owner = self
                    .chain
                    .owner_of(nft.collection, token.token_id)
                    .await
                    .map_err(|err| err.to_rejection())?;
                if owner != signer {
                    return Err(Rejection::new(
                        RejectionCode::InsufficientTokenBalance,
                        format!(
                            "token {}/{} is owned by {owner}, not the listing signer",
                            nft.collection, token.token_id
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Confirms allowance and balance cover the expected cost for every required currency.
    async fn check_buyer(
        &self,
        buy: &Order,
        spender: Address,
        current_price: U256,
    ) -> Result<(), Rejection> {
        let buyer = buy.signer;
        let mut currencies = vec![buy.currency()];
        if !currencies.contains(&self.wrapped_native) {
            currencies.push(self.wrapped_native);
        }

        for currency in currencies {
            let mut expected = self.config.price_headroom.apply(current_price);
            if currency == self.wrapped_native {
                // Room for the gas the buyer may owe on top of the sale.
                expected += self.config.native_cost_buffer;
            }

            let allowance = self
                .chain
                .allowance(currency, buyer, spender)
                .await
                .map_err(|err| err.to_rejection())?;
            if allowance < expected {
                return Err(Rejection::new(
                    RejectionCode::InsufficientCurrencyAllowance,
                    format!("allowance {allowance} of {currency} below expected cost {expected}"),
                ));
            }

            let balance = self
                .chain
                .balance_of(currency, buyer)
                .await
                .map_err(|err| err.to_rejection())?;
            if balance < expected {
                return Err(Rejection::new(
                    RejectionCode::InsufficientCurrencyBalance,
                    format!("balance {balance} of {currency} below expected cost {expected}"),
                ));
            }
        }
        Ok(())
    }
}
