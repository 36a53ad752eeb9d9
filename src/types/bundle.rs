//! Bundle items: matches resolved into their orders, ready for validation and packing.

use super::{
    order::{Constraints, Nft, Order},
    order_match::{MatchData, MatchId, MatchType},
};
use crate::error::Rejection;
use alloy::primitives::{Address, B256, ChainId, U256};

/// A direct listing/offer pair executed through `matchOneToOneOrders`.
#[derive(Debug, Clone)]
pub struct OneToOneItem {
    /// Match the item was built from.
    pub id: MatchId,
    /// Chain the bundle executes on.
    pub chain_id: ChainId,
    /// Exchange contract the bundle calls.
    pub exchange: Address,
    /// The listing.
    pub sell: Order,
    /// The offer.
    pub buy: Order,
    /// Listing hash.
    pub sell_hash: B256,
    /// Offer hash.
    pub buy_hash: B256,
}

/// An N-NFT match executed through `matchOrders`, carrying a constructed buy-side order.
#[derive(Debug, Clone)]
pub struct MatchOrdersItem {
    /// Match the item was built from.
    pub id: MatchId,
    /// Chain the bundle executes on.
    pub chain_id: ChainId,
    /// Exchange contract the bundle calls.
    pub exchange: Address,
    /// The listing.
    pub sell: Order,
    /// The offer.
    pub buy: Order,
    /// Listing hash.
    pub sell_hash: B256,
    /// Offer hash.
    pub buy_hash: B256,
    /// Synthetic buy-side order summarizing the matched NFTs.
    pub constructed: Order,
}

/// A match resolved into its orders, in the shape its exchange call expects.
#[derive(Debug, Clone)]
pub enum BundleItem {
    /// `matchOneToOneOrders` path.
    OneToOne(OneToOneItem),
    /// `matchOrders` path.
    MatchOrders(MatchOrdersItem),
}

impl BundleItem {
    /// The originating match id.
    pub fn id(&self) -> &MatchId {
        match self {
            Self::OneToOne(item) => &item.id,
            Self::MatchOrders(item) => &item.id,
        }
    }

    /// Chain the bundle executes on.
    pub fn chain_id(&self) -> ChainId {
        match self {
            Self::OneToOne(item) => item.chain_id,
            Self::MatchOrders(item) => item.chain_id,
        }
    }

    /// Exchange contract the bundle calls, which is also the transfer operator.
    pub fn exchange(&self) -> Address {
        match self {
            Self::OneToOne(item) => item.exchange,
            Self::MatchOrders(item) => item.exchange,
        }
    }

    /// The listing.
    pub fn sell(&self) -> &Order {
        match self {
            Self::OneToOne(item) => &item.sell,
            Self::MatchOrders(item) => &item.sell,
        }
    }

    /// The offer.
    pub fn buy(&self) -> &Order {
        match self {
            Self::OneToOne(item) => &item.buy,
            Self::MatchOrders(item) => &item.buy,
        }
    }

    /// The NFTs that change hands, i.e. what the seller pass validates.
    pub fn nfts(&self) -> &[Nft] {
        match self {
            Self::OneToOne(item) => &item.sell.nfts,
            Self::MatchOrders(item) => &item.constructed.nfts,
        }
    }

    /// Execution path of the item.
    pub fn ty(&self) -> MatchType {
        match self {
            Self::OneToOne(_) => MatchType::MatchOneToOneOrders,
            Self::MatchOrders(_) => MatchType::MatchOrders,
        }
    }
}

/// A bundle item annotated with its execution price.
#[derive(Debug, Clone)]
pub struct PricedBundleItem {
    /// The verified item.
    pub item: BundleItem,
    /// Execution price in the order currency's smallest unit.
    pub current_price: U256,
}

/// A bundle item rejected by a pipeline stage.
#[derive(Debug)]
pub struct RejectedItem {
    /// The rejected item.
    pub item: BundleItem,
    /// Why it was rejected.
    pub rejection: Rejection,
}

/// Flattens a match's NFT tree into per-collection sets, returning them with the accumulated
/// match count.
///
/// Every collection is emitted even with an empty token list, and an empty list still counts as
/// one match. This preserves collection-level matches where the listing covers a whole
/// collection.
pub(crate) fn flatten_order_items(data: &MatchData) -> (Vec<Nft>, u64) {
    let mut num_matches = 0u64;
    let nfts = data
        .order_items
        .iter()
        .map(|(collection, tokens)| {
            num_matches += tokens.len().max(1) as u64;
            Nft { collection: *collection, tokens: tokens.values().cloned().collect() }
        })
        .collect();
    (nfts, num_matches)
}

/// Builds the constructed buy-side order for the `matchOrders` path.
///
/// Constraints carry the match count in the item-count slot and otherwise mirror the offer's
/// schedule and nonce; the NFT set is the flattened intersection.
pub(crate) fn build_constructed_order(buy: &Order, nfts: Vec<Nft>, num_matches: u64) -> Order {
    Order {
        id: buy.id,
        chain_id: buy.chain_id,
        is_sell_order: false,
        signer: buy.signer,
        constraints: Constraints::new(
            U256::from(num_matches),
            buy.constraints.start_price(),
            buy.constraints.end_price(),
            buy.constraints.start_time(),
            buy.constraints.end_time(),
            buy.constraints.nonce(),
        ),
        nfts,
        exec_params: buy.exec_params,
        extra_params: buy.extra_params.clone(),
        sig: buy.sig.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::order::NftToken;
    use alloy::primitives::{Bytes, address};
    use std::collections::BTreeMap;

    fn token(id: u64) -> NftToken {
        NftToken { token_id: U256::from(id), num_tokens: U256::from(1) }
    }

    fn match_data(collections: &[(Address, &[u64])]) -> MatchData {
        let order_items = collections
            .iter()
            .map(|(collection, ids)| {
                let tokens =
                    ids.iter().map(|id| (id.to_string(), token(*id))).collect::<BTreeMap<_, _>>();
                (*collection, tokens)
            })
            .collect();
        MatchData { order_items }
    }

    #[test]
    fn flattening_counts_tokens_per_collection() {
        let a = address!("00000000000000000000000000000000000000a1");
        let b = address!("00000000000000000000000000000000000000b2");
        let data = match_data(&[(a, &[1, 2, 3]), (b, &[9])]);

        let (nfts, num_matches) = flatten_order_items(&data);
        assert_eq!(num_matches, 4);
        assert_eq!(nfts.len(), 2);
        assert_eq!(nfts[0].tokens.len(), 3);
        assert_eq!(nfts[1].tokens.len(), 1);
    }

    #[test]
    fn empty_token_lists_still_count_as_one_match() {
        let a = address!("00000000000000000000000000000000000000a1");
        let b = address!("00000000000000000000000000000000000000b2");
        let data = match_data(&[(a, &[]), (b, &[5, 6])]);

        let (nfts, num_matches) = flatten_order_items(&data);
        assert_eq!(num_matches, 3);
        assert_eq!(nfts.len(), 2, "collection-level entries must be preserved");
        assert!(nfts[0].tokens.is_empty());
    }

    #[test]
    fn constructed_order_mirrors_the_offer() {
        let buy = Order {
            id: B256::with_last_byte(9),
            chain_id: 1,
            is_sell_order: false,
            signer: address!("00000000000000000000000000000000000000cc"),
            constraints: Constraints::new(
                U256::from(1),
                U256::from(100),
                U256::from(50),
                U256::from(1_000),
                U256::from(2_000),
                U256::from(77),
            ),
            nfts: vec![],
            exec_params: [Address::ZERO, address!("00000000000000000000000000000000000000ee")],
            extra_params: Bytes::new(),
            sig: Bytes::from(vec![1, 2, 3]),
        };

        let nfts = vec![Nft { collection: Address::ZERO, tokens: vec![token(1), token(2)] }];
        let constructed = build_constructed_order(&buy, nfts, 2);

        assert!(!constructed.is_sell_order);
        assert_eq!(constructed.signer, buy.signer);
        assert_eq!(constructed.constraints.num_items(), U256::from(2));
        assert_eq!(constructed.constraints.start_price(), U256::from(100));
        assert_eq!(constructed.constraints.nonce(), U256::from(77));
        assert_eq!(constructed.nfts.len(), 1);
        assert_eq!(constructed.sig, buy.sig);
    }
}
