use super::api::{ChainApi, Result};
use crate::{
    constants::DEFAULT_RPC_TIMEOUT,
    error::ChainError,
    types::{IERC20, IERC721, MatchExchange, Order},
};
use alloy::{
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use std::{future::IntoFuture, time::Duration};

/// [`ChainApi`] implementation over an alloy provider, bound to one exchange deployment.
///
/// Every call runs under a deadline; exceeding it surfaces as [`ChainError::Timeout`], which the
/// stages report as an unclassified failure.
#[derive(Debug, Clone)]
pub struct RpcChainApi {
    /// Network provider.
    provider: DynProvider,
    /// Exchange contract address.
    exchange: Address,
    /// Per-call deadline.
    timeout: Duration,
}

impl RpcChainApi {
    /// Creates a new [`RpcChainApi`] with the default deadline.
    pub fn new(provider: DynProvider, exchange: Address) -> Self {
        Self { provider, exchange, timeout: DEFAULT_RPC_TIMEOUT }
    }

    /// Overrides the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs a contract call under the configured deadline.
    async fn bounded<T>(
        &self,
        call: impl IntoFuture<Output = core::result::Result<T, alloy::contract::Error>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, call.into_future())
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
            .map_err(ChainError::from)
    }
}

#[async_trait]
impl ChainApi for RpcChainApi {
    async fn verify_match_orders(
        &self,
        sell_hash: B256,
        buy_hash: B256,
        sell: &Order,
        buy: &Order,
    ) -> Result<bool> {
        let exchange = MatchExchange::new(self.exchange, &self.provider);
        self.bounded(exchange.verifyMatchOrders(sell_hash, buy_hash, sell.into(), buy.into()).call())
            .await
    }

    async fn is_approved_for_all(
        &self,
        collection: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool> {
        let collection = IERC721::new(collection, &self.provider);
        self.bounded(collection.isApprovedForAll(owner, operator).call()).await
    }

    async fn owner_of(&self, collection: Address, token_id: U256) -> Result<Address> {
        let collection = IERC721::new(collection, &self.provider);
        self.bounded(collection.ownerOf(token_id).call()).await
    }

    async fn allowance(&self, currency: Address, owner: Address, spender: Address) -> Result<U256> {
        let currency = IERC20::new(currency, &self.provider);
        self.bounded(currency.allowance(owner, spender).call()).await
    }

    async fn balance_of(&self, currency: Address, owner: Address) -> Result<U256> {
        let currency = IERC20::new(currency, &self.provider);
        self.bounded(currency.balanceOf(owner).call()).await
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64> {
        tokio::time::timeout(self.timeout, self.provider.estimate_gas(tx))
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
            .map_err(ChainError::from)
    }
}
