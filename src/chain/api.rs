use crate::{error::ChainError, types::Order};
use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use std::fmt::Debug;

/// Type alias for `Result<T, ChainError>`
pub type Result<T> = core::result::Result<T, ChainError>;

/// Read-only chain surface the pipeline validates and sizes bundles against.
///
/// One instance is bound to a `(chain, exchange)` pair and shared across the pipeline stages.
#[async_trait]
pub trait ChainApi: Debug + Send + Sync {
    /// Asks the exchange whether the order pair is currently executable.
    async fn verify_match_orders(
        &self,
        sell_hash: B256,
        buy_hash: B256,
        sell: &Order,
        buy: &Order,
    ) -> Result<bool>;

    /// ERC-721 `isApprovedForAll(owner, operator)` on `collection`.
    async fn is_approved_for_all(
        &self,
        collection: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool>;

    /// ERC-721 `ownerOf(token_id)` on `collection`.
    async fn owner_of(&self, collection: Address, token_id: U256) -> Result<Address>;

    /// ERC-20 `allowance(owner, spender)` on `currency`.
    async fn allowance(&self, currency: Address, owner: Address, spender: Address) -> Result<U256>;

    /// ERC-20 `balanceOf(owner)` on `currency`.
    async fn balance_of(&self, currency: Address, owner: Address) -> Result<U256>;

    /// `eth_estimateGas` for `tx`.
    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64>;
}
