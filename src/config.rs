//! Executor configuration.

use crate::constants::{
    DEFAULT_DRAIN_INTERVAL, DEFAULT_DRAIN_WATERMARK, DEFAULT_MAX_GAS_LIMIT,
    DEFAULT_MIN_BUNDLE_SIZE, DEFAULT_RPC_TIMEOUT,
};
use alloy::primitives::{Address, ChainId, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Chains to run a pipeline for, one executor each.
    pub chains: Vec<ChainConfig>,
    /// Bundle packing configuration.
    #[serde(default)]
    pub packer: PackerConfig,
    /// Asset validation configuration.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Work queue draining configuration.
    #[serde(default)]
    pub drain: DrainConfig,
}

/// Per-chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Chain id.
    pub chain_id: ChainId,
    /// RPC endpoint to read chain state from.
    pub endpoint: Url,
    /// Exchange contract address. Also the operator sellers must approve.
    pub exchange: Address,
    /// Wrapped-native ERC-20, always included in buyer-side currency checks.
    pub wrapped_native: Address,
    /// Address the broadcaster sends bundles from; gas estimates are made from it.
    pub signer: Address,
}

/// Bundle packing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackerConfig {
    /// Per-transaction gas ceiling.
    pub max_gas_limit: u64,
    /// Headroom applied to gas estimates.
    pub gas_headroom: Headroom,
    /// Floor below which a batch is not submitted.
    pub min_bundle_size: usize,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_gas_limit: DEFAULT_MAX_GAS_LIMIT,
            gas_headroom: Headroom::new(12, 10),
            min_bundle_size: DEFAULT_MIN_BUNDLE_SIZE,
        }
    }
}

/// Asset validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Headroom applied to the current price when checking buyer funds.
    pub price_headroom: Headroom,
    /// Flat addend reserved for gas when the checked currency is the wrapped native token.
    #[serde(with = "crate::serde::u256_decimal")]
    pub native_cost_buffer: U256,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { price_headroom: Headroom::new(11, 10), native_cost_buffer: U256::ZERO }
    }
}

/// Work queue draining configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrainConfig {
    /// Interval between queue drains.
    #[serde(with = "crate::serde::duration")]
    pub interval: Duration,
    /// Queue size that triggers a drain ahead of the tick.
    pub watermark: usize,
    /// Deadline applied to each chain RPC call.
    #[serde(with = "crate::serde::duration")]
    pub rpc_timeout: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_DRAIN_INTERVAL,
            watermark: DEFAULT_DRAIN_WATERMARK,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

/// An integer ratio applied as a safety multiplier, flooring the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headroom {
    /// Ratio numerator.
    pub numerator: u64,
    /// Ratio denominator.
    pub denominator: u64,
}

impl Headroom {
    /// Creates a new [`Headroom`] ratio.
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self { numerator, denominator }
    }

    /// Applies the ratio to a gas amount.
    pub fn apply_gas(&self, gas: u64) -> u64 {
        (gas as u128 * self.numerator as u128 / self.denominator as u128) as u64
    }

    /// Applies the ratio to a currency amount.
    pub fn apply(&self, amount: U256) -> U256 {
        amount * U256::from(self.numerator) / U256::from(self.denominator)
    }
}
