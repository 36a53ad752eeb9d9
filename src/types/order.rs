//! Signed maker orders and their Dutch-auction price schedule.

use alloy::primitives::{Address, B256, Bytes, ChainId, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

/// The six order constraints: `[num_items, start_price, end_price, start_time, end_time, nonce]`.
///
/// Entries are arbitrary-precision and cross the datastore as canonical decimal strings;
/// deserializing re-normalizes any parseable numeric form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints([U256; 6]);

impl Constraints {
    /// Creates constraints from their canonical layout.
    pub const fn new(
        num_items: U256,
        start_price: U256,
        end_price: U256,
        start_time: U256,
        end_time: U256,
        nonce: U256,
    ) -> Self {
        Self([num_items, start_price, end_price, start_time, end_time, nonce])
    }

    /// Number of items the order is for. Carries `num_matches` on constructed orders.
    pub const fn num_items(&self) -> U256 {
        self.0[0]
    }

    /// Price at the start of the schedule, in the order currency's smallest unit.
    pub const fn start_price(&self) -> U256 {
        self.0[1]
    }

    /// Price at the end of the schedule.
    pub const fn end_price(&self) -> U256 {
        self.0[2]
    }

    /// Schedule start, in seconds since the epoch.
    pub const fn start_time(&self) -> U256 {
        self.0[3]
    }

    /// Schedule end, in seconds since the epoch.
    pub const fn end_time(&self) -> U256 {
        self.0[4]
    }

    /// Order nonce.
    pub const fn nonce(&self) -> U256 {
        self.0[5]
    }

    /// All six entries in wire order.
    pub fn as_slice(&self) -> &[U256] {
        &self.0
    }
}

impl Serialize for Constraints {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|entry| entry.to_string()))
    }
}

impl<'de> Deserialize<'de> for Constraints {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<String>::deserialize(deserializer)?;
        let parsed = entries
            .iter()
            .map(|raw| raw.parse::<U256>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(D::Error::custom)?;
        let entries: [U256; 6] = parsed
            .try_into()
            .map_err(|parsed: Vec<U256>| D::Error::invalid_length(parsed.len(), &"6 order constraints"))?;
        Ok(Self(entries))
    }
}

/// A single NFT within an order item: `num_tokens` units of `token_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftToken {
    /// Token id within the collection.
    #[serde(with = "crate::serde::u256_decimal")]
    pub token_id: U256,
    /// Number of units, 1 for plain ERC-721.
    #[serde(with = "crate::serde::u256_decimal")]
    pub num_tokens: U256,
}

/// A set of tokens under one collection.
///
/// An empty token list denotes a collection-level order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    /// Collection contract address.
    pub collection: Address,
    /// Tokens under the collection.
    #[serde(default)]
    pub tokens: Vec<NftToken>,
}

/// A signed maker order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order hash, which is also the id the datastore stores the order under.
    pub id: B256,
    /// Chain the order executes on.
    pub chain_id: ChainId,
    /// Whether this is a listing (`true`) or an offer (`false`).
    pub is_sell_order: bool,
    /// Order signer.
    pub signer: Address,
    /// `[num_items, start_price, end_price, start_time, end_time, nonce]`.
    pub constraints: Constraints,
    /// NFTs the order covers.
    pub nfts: Vec<Nft>,
    /// `[complication, currency]` execution parameters.
    pub exec_params: [Address; 2],
    /// Extra order parameters, opaque to the executor.
    #[serde(default)]
    pub extra_params: Bytes,
    /// Order signature, opaque to the executor.
    #[serde(default)]
    pub sig: Bytes,
}

impl Order {
    /// The currency the order settles in.
    pub fn currency(&self) -> Address {
        self.exec_params[1]
    }

    /// Dutch-auction price at `timestamp`, in seconds since the epoch.
    ///
    /// Linearly interpolates from `start_price` to `end_price` over `[start_time, end_time]`.
    /// Returns `None` outside the window; such orders must be rejected before packing.
    pub fn price_at(&self, timestamp: u64) -> Option<U256> {
        let t = U256::from(timestamp);
        let (start, end) = (self.constraints.start_time(), self.constraints.end_time());
        if t < start || t > end {
            return None;
        }

        let (start_price, end_price) = (self.constraints.start_price(), self.constraints.end_price());
        if start == end {
            return Some(start_price);
        }

        let (elapsed, duration) = (t - start, end - start);
        Some(if end_price >= start_price {
            start_price + (end_price - start_price) * elapsed / duration
        } else {
            start_price - (start_price - end_price) * elapsed / duration
        })
    }
}
