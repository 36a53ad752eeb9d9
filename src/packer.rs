//! Packs validated items into gas-bounded exchange transactions.

use crate::{
    chain::ChainApi,
    config::PackerConfig,
    error::{Rejection, RejectionCode},
    types::{BundleItem, MatchExchange, MatchId, PricedBundleItem, RejectedItem},
};
use alloy::{
    primitives::{Address, Bytes, ChainId, TxKind},
    rpc::types::{TransactionInput, TransactionRequest},
    sol_types::SolCall,
};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// An encoded exchange transaction plus the matches it settles.
#[derive(Debug, Clone)]
pub struct BundleTransaction {
    /// Chain the transaction executes on.
    pub chain_id: ChainId,
    /// Exchange contract address.
    pub to: Address,
    /// Encoded `matchOrders`/`matchOneToOneOrders` calldata.
    pub data: Bytes,
    /// Gas limit with headroom applied.
    pub gas_limit: u64,
    /// Matches settled by this transaction, in packing order.
    pub matches: Vec<MatchId>,
}

impl BundleTransaction {
    /// Builds the EIP-1559 request handed to the broadcaster.
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(self.to)),
            input: TransactionInput::new(self.data.clone()),
            gas: Some(self.gas_limit),
            chain_id: Some(self.chain_id),
            transaction_type: Some(2),
            ..Default::default()
        }
    }
}

/// Result of packing one batch.
#[derive(Debug, Default)]
pub struct PackOutput {
    /// Transactions ready for the broadcaster.
    pub transactions: Vec<BundleTransaction>,
    /// Items no bundle split fits under the gas ceiling.
    pub rejected: Vec<RejectedItem>,
    /// Items to retry on a later drain: their bucket would not estimate, or the batch was under
    /// the floor.
    pub deferred: Vec<PricedBundleItem>,
}

/// Where an item of the batch ended up after the terminal packing round.
#[derive(Clone, Copy)]
enum Slot {
    Submitted,
    Rejected,
    Deferred,
}

/// Partitions validated items into bundles whose estimated gas fits the configured ceiling,
/// re-splitting with more bundles whenever an estimate lands above it.
///
/// Bound to the `(chain, signer)` the transactions will be sent from. Gas estimation is the only
/// sizing oracle; item counts and calldata sizes are never trusted.
#[derive(Debug)]
pub struct BundlePacker<C> {
    chain: Arc<C>,
    chain_id: ChainId,
    exchange: Address,
    /// Address estimates are made from; must match the broadcaster's signer.
    signer: Address,
    config: PackerConfig,
}

impl<C: ChainApi> BundlePacker<C> {
    /// Creates a new [`BundlePacker`].
    pub fn new(
        chain: Arc<C>,
        chain_id: ChainId,
        exchange: Address,
        signer: Address,
        config: PackerConfig,
    ) -> Self {
        Self { chain, chain_id, exchange, signer, config }
    }

    /// Packs `items` into transactions under the gas ceiling.
    ///
    /// The two execution paths encode into different exchange calls and pack independently.
    /// Batches under the configured floor are deferred wholesale.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn pack(&self, items: Vec<PricedBundleItem>) -> PackOutput {
        let mut output = PackOutput::default();
        if items.len() < self.config.min_bundle_size {
            debug!(
                items = items.len(),
                floor = self.config.min_bundle_size,
                "batch below the bundle floor, deferring"
            );
            output.deferred = items;
            return output;
        }

        let (one_to_one, match_orders): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|item| matches!(item.item, BundleItem::OneToOne(_)));

        for group in [one_to_one, match_orders] {
            if !group.is_empty() {
                self.pack_group(group, &mut output).await;
            }
        }
        output
    }

    /// Packs one homogeneous group, growing the bundle count until every estimate fits.
    async fn pack_group(&self, items: Vec<PricedBundleItem>, output: &mut PackOutput) {
        let cap = items.len().max(8);
        let mut num_bundles = 1usize;

        loop {
            let k = num_bundles.min(items.len());
            let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); k];
            for idx in 0..items.len() {
                buckets[idx % k].push(idx);
            }

            let encoded: Vec<Bytes> =
                buckets.iter().map(|bucket| self.encode(bucket, &items)).collect();
            let estimates =
                join_all(encoded.iter().map(|data| self.chain.estimate_gas(self.request(data))))
                    .await;

            // Buckets that fail to estimate drop out; they never fail the whole batch.
            let mut surviving = Vec::new();
            for (bucket, estimate) in estimates.into_iter().enumerate() {
                match estimate {
                    Ok(gas) => surviving.push((bucket, gas)),
                    Err(err) => {
                        warn!(%err, items = buckets[bucket].len(), "bundle gas estimation failed");
                    }
                }
            }

            let over_ceiling =
                |gas: u64| self.config.gas_headroom.apply_gas(gas) > self.config.max_gas_limit;
            if surviving.iter().any(|(_, gas)| over_ceiling(*gas)) && num_bundles < cap {
                let total: u64 = surviving.iter().map(|(_, gas)| *gas).sum();
                let by_gas = total.div_ceil(self.config.max_gas_limit) as usize;
                num_bundles = by_gas.max(num_bundles * 2).min(cap);
                debug!(num_bundles, "estimate above the gas ceiling, re-splitting");
                continue;
            }

            // Terminal round: emit fitting bundles, reject what still does not fit, defer the
            // buckets that would not estimate.
            let mut slots = vec![Slot::Deferred; items.len()];
            for (bucket, gas) in surviving {
                let gas_limit = self.config.gas_headroom.apply_gas(gas);
                if gas_limit > self.config.max_gas_limit {
                    for &idx in &buckets[bucket] {
                        slots[idx] = Slot::Rejected;
                    }
                } else {
                    output.transactions.push(BundleTransaction {
                        chain_id: self.chain_id,
                        to: self.exchange,
                        data: encoded[bucket].clone(),
                        gas_limit,
                        matches: buckets[bucket]
                            .iter()
                            .map(|&idx| items[idx].item.id().clone())
                            .collect(),
                    });
                    for &idx in &buckets[bucket] {
                        slots[idx] = Slot::Submitted;
                    }
                }
            }

            for (item, slot) in items.into_iter().zip(slots) {
                match slot {
                    Slot::Submitted => {}
                    Slot::Rejected => output.rejected.push(RejectedItem {
                        item: item.item,
                        rejection: Rejection::new(
                            RejectionCode::BundleTooLarge,
                            format!(
                                "no bundle split fits under the {} gas ceiling",
                                self.config.max_gas_limit
                            ),
                        ),
                    }),
                    Slot::Deferred => output.deferred.push(item),
                }
            }
            return;
        }
    }

    /// Encodes a bucket as calldata for its execution path.
    fn encode(&self, bucket: &[usize], items: &[PricedBundleItem]) -> Bytes {
        let mut sells = Vec::with_capacity(bucket.len());
        let mut buys = Vec::with_capacity(bucket.len());
        let mut constructs: Vec<Vec<MatchExchange::OrderItem>> = Vec::new();
        let mut one_to_one = true;

        for &idx in bucket {
            match &items[idx].item {
                BundleItem::OneToOne(item) => {
                    sells.push(MatchExchange::MakerOrder::from(&item.sell));
                    buys.push(MatchExchange::MakerOrder::from(&item.buy));
                }
                BundleItem::MatchOrders(item) => {
                    one_to_one = false;
                    sells.push(MatchExchange::MakerOrder::from(&item.sell));
                    buys.push(MatchExchange::MakerOrder::from(&item.buy));
                    constructs.push(
                        item.constructed.nfts.iter().map(MatchExchange::OrderItem::from).collect(),
                    );
                }
            }
        }

        if one_to_one {
            MatchExchange::matchOneToOneOrdersCall { makerOrders1: sells, makerOrders2: buys }
                .abi_encode()
                .into()
        } else {
            MatchExchange::matchOrdersCall { sells, buys, constructs }.abi_encode().into()
        }
    }

    /// The request gas is estimated against.
    fn request(&self, data: &Bytes) -> TransactionRequest {
        TransactionRequest {
            from: Some(self.signer),
            to: Some(TxKind::Call(self.exchange)),
            input: TransactionInput::new(data.clone()),
            chain_id: Some(self.chain_id),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Headroom,
        error::ChainError,
        types::{Constraints, MatchOrdersItem, OneToOneItem, Order},
    };
    use alloy::{
        primitives::{B256, U256, address},
        transports::TransportErrorKind,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;

    const EXCHANGE: Address = address!("00000000000000000000000000000000000000e1");
    const SIGNER: Address = address!("00000000000000000000000000000000000000f1");
    const POISON: Address = address!("0000000000000000000000000000000000000bad");

    /// Estimates a flat gas amount per packed order, decoding the calldata to count them.
    /// Buckets containing an order signed by [`POISON`] fail estimation.
    #[derive(Debug)]
    struct GasPerItem(u64);

    #[async_trait]
    impl ChainApi for GasPerItem {
        async fn verify_match_orders(
            &self,
            _: B256,
            _: B256,
            _: &Order,
            _: &Order,
        ) -> Result<bool, ChainError> {
            unreachable!("packer never verifies")
        }

        async fn is_approved_for_all(
            &self,
            _: Address,
            _: Address,
            _: Address,
        ) -> Result<bool, ChainError> {
            unreachable!("packer never checks approvals")
        }

        async fn owner_of(&self, _: Address, _: U256) -> Result<Address, ChainError> {
            unreachable!("packer never checks ownership")
        }

        async fn allowance(&self, _: Address, _: Address, _: Address) -> Result<U256, ChainError> {
            unreachable!("packer never checks allowances")
        }

        async fn balance_of(&self, _: Address, _: Address) -> Result<U256, ChainError> {
            unreachable!("packer never checks balances")
        }

        async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, ChainError> {
            let data = tx.input.input().unwrap();
            let sells = if let Ok(call) = MatchExchange::matchOrdersCall::abi_decode(data) {
                call.sells
            } else {
                MatchExchange::matchOneToOneOrdersCall::abi_decode(data).unwrap().makerOrders1
            };
            if sells.iter().any(|order| order.signer == POISON) {
                return Err(ChainError::Rpc(TransportErrorKind::custom_str("execution reverted")));
            }
            Ok(self.0 * sells.len() as u64)
        }
    }

    fn order(id: u8, is_sell: bool, signer: Address) -> Order {
        Order {
            id: B256::with_last_byte(id),
            chain_id: 1,
            is_sell_order: is_sell,
            signer,
            constraints: Constraints::new(
                U256::from(1),
                U256::from(100),
                U256::from(100),
                U256::ZERO,
                U256::from(u64::MAX),
                U256::from(id),
            ),
            nfts: vec![],
            exec_params: [Address::ZERO, Address::ZERO],
            extra_params: Default::default(),
            sig: Default::default(),
        }
    }

    fn one_to_one(n: u8, seller: Address) -> PricedBundleItem {
        PricedBundleItem {
            item: BundleItem::OneToOne(OneToOneItem {
                id: MatchId::new(format!("m{n}")),
                chain_id: 1,
                exchange: EXCHANGE,
                sell: order(n, true, seller),
                buy: order(n.wrapping_add(100), false, SIGNER),
                sell_hash: B256::with_last_byte(n),
                buy_hash: B256::with_last_byte(n.wrapping_add(100)),
            }),
            current_price: U256::from(100),
        }
    }

    fn match_orders(n: u8, seller: Address) -> PricedBundleItem {
        let buy = order(n.wrapping_add(100), false, SIGNER);
        let constructed = order(n.wrapping_add(100), false, SIGNER);
        PricedBundleItem {
            item: BundleItem::MatchOrders(MatchOrdersItem {
                id: MatchId::new(format!("m{n}")),
                chain_id: 1,
                exchange: EXCHANGE,
                sell: order(n, true, seller),
                buy,
                sell_hash: B256::with_last_byte(n),
                buy_hash: B256::with_last_byte(n.wrapping_add(100)),
                constructed,
            }),
            current_price: U256::from(100),
        }
    }

    fn packer(chain: GasPerItem, config: PackerConfig) -> BundlePacker<GasPerItem> {
        BundlePacker::new(Arc::new(chain), 1, EXCHANGE, SIGNER, config)
    }

    fn config(max_gas_limit: u64) -> PackerConfig {
        PackerConfig { max_gas_limit, gas_headroom: Headroom::new(12, 10), min_bundle_size: 1 }
    }

    #[tokio::test]
    async fn splits_until_every_bundle_fits() {
        let packer = packer(GasPerItem(200_000), config(1_000_000));
        let items: Vec<_> = (0..10).map(|n| one_to_one(n, SIGNER)).collect();
        let ids: HashSet<_> = items.iter().map(|item| item.item.id().clone()).collect();

        let output = packer.pack(items).await;

        assert!(output.rejected.is_empty());
        assert!(output.deferred.is_empty());
        assert!(output.transactions.iter().all(|tx| tx.gas_limit <= 1_000_000));
        // 10 items at 200k each double from one bundle until four hold 3/3/2/2.
        assert_eq!(output.transactions.len(), 4);

        let mut packed = Vec::new();
        for tx in &output.transactions {
            packed.extend(tx.matches.iter().cloned());
        }
        assert_eq!(packed.len(), 10, "every match lands in exactly one bundle");
        assert_eq!(packed.into_iter().collect::<HashSet<_>>(), ids);
    }

    #[tokio::test]
    async fn gas_limit_carries_headroom() {
        let packer = packer(GasPerItem(100_000), config(1_000_000));
        let output = packer.pack(vec![one_to_one(1, SIGNER)]).await;

        assert_eq!(output.transactions.len(), 1);
        assert_eq!(output.transactions[0].gas_limit, 120_000);
    }

    #[tokio::test]
    async fn unsplittable_item_is_rejected_as_too_large() {
        let packer = packer(GasPerItem(2_000_000), config(1_000_000));
        let output = packer.pack(vec![one_to_one(1, SIGNER)]).await;

        assert!(output.transactions.is_empty());
        assert_eq!(output.rejected.len(), 1);
        assert_eq!(output.rejected[0].rejection.code, RejectionCode::BundleTooLarge);
    }

    #[tokio::test]
    async fn batch_below_the_floor_is_deferred() {
        let mut cfg = config(1_000_000);
        cfg.min_bundle_size = 3;
        let packer = packer(GasPerItem(100_000), cfg);

        let output = packer.pack(vec![one_to_one(1, SIGNER), one_to_one(2, SIGNER)]).await;
        assert!(output.transactions.is_empty());
        assert!(output.rejected.is_empty());
        assert_eq!(output.deferred.len(), 2);
    }

    #[tokio::test]
    async fn estimation_failure_defers_only_its_bucket() {
        let packer = packer(GasPerItem(100_000), config(1_000_000));
        let output =
            packer.pack(vec![one_to_one(1, SIGNER), match_orders(2, POISON)]).await;

        assert_eq!(output.transactions.len(), 1);
        assert_eq!(output.transactions[0].matches, vec![MatchId::new("m1")]);
        assert!(output.rejected.is_empty());
        assert_eq!(output.deferred.len(), 1);
        assert_eq!(output.deferred[0].item.id(), &MatchId::new("m2"));
    }

    #[tokio::test]
    async fn execution_paths_encode_into_separate_calls() {
        let packer = packer(GasPerItem(100_000), config(10_000_000));
        let output = packer
            .pack(vec![one_to_one(1, SIGNER), one_to_one(2, SIGNER), match_orders(3, SIGNER)])
            .await;

        assert_eq!(output.transactions.len(), 2);
        let one_to_one_tx = &output.transactions[0];
        let match_orders_tx = &output.transactions[1];

        let call =
            MatchExchange::matchOneToOneOrdersCall::abi_decode(&one_to_one_tx.data).unwrap();
        assert_eq!(call.makerOrders1.len(), 2);

        let call = MatchExchange::matchOrdersCall::abi_decode(&match_orders_tx.data).unwrap();
        assert_eq!(call.sells.len(), 1);
        assert_eq!(call.constructs.len(), 1);
    }

    #[tokio::test]
    async fn request_is_eip1559() {
        let tx = BundleTransaction {
            chain_id: 1,
            to: EXCHANGE,
            data: Bytes::from(vec![1]),
            gas_limit: 90_000,
            matches: vec![MatchId::new("m1")],
        };
        let request = tx.to_request(SIGNER);
        assert_eq!(request.transaction_type, Some(2));
        assert_eq!(request.gas, Some(90_000));
        assert_eq!(request.chain_id, Some(1));
        assert_eq!(request.from, Some(SIGNER));
    }
}
