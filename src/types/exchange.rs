//! Exchange contract bindings and conversions from datastore orders.

use super::order::{Nft, Order};
use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    contract MatchExchange {
        /// A single NFT within an order: `numTokens` units of `tokenId`.
        struct TokenInfo {
            uint256 tokenId;
            uint256 numTokens;
        }

        /// Tokens under one collection. An empty token list covers the whole collection.
        struct OrderItem {
            address collection;
            TokenInfo[] tokens;
        }

        /// A signed maker order.
        ///
        /// `constraints` is `[numItems, startPrice, endPrice, startTime, endTime, nonce]` and
        /// `execParams` is `[complication, currency]`.
        struct MakerOrder {
            bool isSellOrder;
            address signer;
            uint256[] constraints;
            OrderItem[] nfts;
            address[] execParams;
            bytes extraParams;
            bytes sig;
        }

        /// Executes each `sells[i]` against `buys[i]`, transferring the NFTs in `constructs[i]`.
        function matchOrders(
            MakerOrder[] calldata sells,
            MakerOrder[] calldata buys,
            OrderItem[][] calldata constructs
        ) external;

        /// Executes each listing in `makerOrders1` against its paired offer in `makerOrders2`.
        function matchOneToOneOrders(
            MakerOrder[] calldata makerOrders1,
            MakerOrder[] calldata makerOrders2
        ) external;

        /// Whether the order pair is currently executable.
        function verifyMatchOrders(
            bytes32 sellOrderHash,
            bytes32 buyOrderHash,
            MakerOrder calldata sell,
            MakerOrder calldata buy
        ) external view returns (bool);
    }
}

impl From<&Nft> for MatchExchange::OrderItem {
    fn from(nft: &Nft) -> Self {
        Self {
            collection: nft.collection,
            tokens: nft
                .tokens
                .iter()
                .map(|token| MatchExchange::TokenInfo {
                    tokenId: token.token_id,
                    numTokens: token.num_tokens,
                })
                .collect(),
        }
    }
}

impl From<&Order> for MatchExchange::MakerOrder {
    fn from(order: &Order) -> Self {
        Self {
            isSellOrder: order.is_sell_order,
            signer: order.signer,
            constraints: order.constraints.as_slice().to_vec(),
            nfts: order.nfts.iter().map(Into::into).collect(),
            execParams: order.exec_params.to_vec(),
            extraParams: order.extra_params.clone(),
            sig: order.sig.clone(),
        }
    }
}
