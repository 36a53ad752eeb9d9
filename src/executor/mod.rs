//! Per-chain transaction orchestrator.

mod metrics;
use self::metrics::ExecutorMetrics;

use crate::{
    broadcast::{Broadcaster, BundleOutcome},
    builder::BundleItemBuilder,
    chain::{ChainApi, RpcChainApi},
    config::{ChainConfig, DrainConfig, ExecutorConfig},
    error::Rejection,
    packer::{BundlePacker, PackOutput},
    source::{MatchEvent, MatchSource, MatchStore},
    types::{MatchId, MatchState, OrderMatch, RejectedItem},
    validation::AssetValidator,
    verifier::MatchVerifier,
};
use alloy::{
    primitives::ChainId,
    providers::{Provider, ProviderBuilder},
};
use chrono::Utc;
use futures_util::{StreamExt, stream::FuturesUnordered};
use std::{
    collections::{HashMap, HashSet},
    pin::Pin,
    sync::Arc,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};

type OutcomeFuture = Pin<Box<dyn Future<Output = (Vec<MatchId>, BundleOutcome)> + Send>>;
type PendingOutcomes = FuturesUnordered<OutcomeFuture>;

/// Stage a match owned by the executor is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Queued, waiting for the next drain.
    Discovered,
    /// Orders being resolved into a bundle item.
    Building,
    /// Exchange-side verification.
    Verifying,
    /// Ownership, approval and funds checks.
    AssetChecking,
    /// Gas-bounded bundle packing.
    Packing,
    /// Handed to the broadcaster, awaiting the terminal outcome.
    Submitted,
}

/// Messages accepted by the [`MatchExecutor`].
#[derive(Debug)]
enum ExecutorMessage {
    /// Stop accepting events and drain in-flight work.
    Shutdown(oneshot::Sender<()>),
}

/// Handle to communicate with a spawned [`MatchExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    command_tx: mpsc::UnboundedSender<ExecutorMessage>,
}

impl ExecutorHandle {
    /// Stops the executor after draining queued and in-flight work best-effort.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(ExecutorMessage::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Per-chain orchestrator: consumes match events and drives every match to a terminal outcome.
///
/// Runs as a single task, so state transitions for any match id are serialized by construction.
/// Batches are drained on a tick or once the queue reaches the configured watermark, and flow
/// through build, verify, asset checks and packing; every stage returns typed rejections that are
/// written back to the match source, never failing the batch.
pub struct MatchExecutor<S, C, B> {
    events: mpsc::UnboundedReceiver<MatchEvent>,
    command_rx: mpsc::UnboundedReceiver<ExecutorMessage>,
    pipeline: Pipeline<S, C, B>,
}

impl<S, C, B> std::fmt::Debug for MatchExecutor<S, C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchExecutor").field("chain_id", &self.pipeline.chain_id).finish()
    }
}

impl<S, C, B> MatchExecutor<S, C, B>
where
    S: MatchStore + 'static,
    C: ChainApi + 'static,
    B: Broadcaster + 'static,
{
    /// Creates a new [`MatchExecutor`] for one chain, opening the match subscription.
    ///
    /// Resolves once the first subscription attempt succeeds; the initial active snapshot is then
    /// queued for the first drain.
    pub async fn new(
        store: Arc<S>,
        chain: Arc<C>,
        broadcaster: Arc<B>,
        chain_cfg: &ChainConfig,
        config: &ExecutorConfig,
    ) -> (Self, ExecutorHandle) {
        let source = MatchSource::new(store.clone());
        let events = source.start().await;
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let pipeline = Pipeline {
            chain_id: chain_cfg.chain_id,
            builder: BundleItemBuilder::new(store, chain_cfg.chain_id, chain_cfg.exchange),
            verifier: MatchVerifier::new(chain.clone()),
            validator: AssetValidator::new(
                chain.clone(),
                chain_cfg.wrapped_native,
                config.validation.clone(),
            ),
            packer: BundlePacker::new(
                chain,
                chain_cfg.chain_id,
                chain_cfg.exchange,
                chain_cfg.signer,
                config.packer.clone(),
            ),
            source,
            broadcaster,
            drain: config.drain.clone(),
            queue: HashMap::new(),
            cancelled: HashSet::new(),
            stages: HashMap::new(),
            metrics: ExecutorMetrics::new_with_labels(&[(
                "chain_id",
                chain_cfg.chain_id.to_string(),
            )]),
        };

        (Self { events, command_rx, pipeline }, ExecutorHandle { command_tx })
    }

    /// Runs the executor until it is shut down or the event stream closes.
    pub async fn run(self) {
        let Self { mut events, mut command_rx, mut pipeline } = self;
        let mut interval = tokio::time::interval(pipeline.drain.interval);
        let mut outcomes = PendingOutcomes::new();
        let mut shutdown: Option<oneshot::Sender<()>> = None;
        let mut events_closed = false;
        let mut commands_closed = false;

        info!(chain_id = pipeline.chain_id, "match executor started");

        loop {
            tokio::select! {
                event = events.recv(), if shutdown.is_none() && !events_closed => match event {
                    Some(event) => {
                        pipeline.on_event(event);
                        if pipeline.queue.len() >= pipeline.drain.watermark {
                            pipeline.drain_queue(&mut events, &mut outcomes, false).await;
                        }
                    }
                    None => {
                        events_closed = true;
                        pipeline.drain_queue(&mut events, &mut outcomes, true).await;
                    }
                },
                command = command_rx.recv(), if shutdown.is_none() && !commands_closed => {
                    match command {
                        Some(ExecutorMessage::Shutdown(ack)) => {
                            debug!(chain_id = pipeline.chain_id, "executor shutting down");
                            shutdown = Some(ack);
                            pipeline.drain_queue(&mut events, &mut outcomes, true).await;
                        }
                        None => commands_closed = true,
                    }
                },
                _ = interval.tick() => {
                    let shutting_down = shutdown.is_some() || events_closed;
                    pipeline.drain_queue(&mut events, &mut outcomes, shutting_down).await;
                }
                Some((matches, outcome)) = outcomes.next(), if !outcomes.is_empty() => {
                    pipeline.on_outcome(matches, outcome).await;
                }
            }

            if (shutdown.is_some() || events_closed)
                && pipeline.queue.is_empty()
                && outcomes.is_empty()
            {
                break;
            }
        }

        if let Some(ack) = shutdown {
            let _ = ack.send(());
        }
        info!(chain_id = pipeline.chain_id, "match executor stopped");
    }
}

/// The pipeline stages plus the keyed work state owned by one executor.
struct Pipeline<S, C, B> {
    chain_id: ChainId,
    source: MatchSource<S>,
    builder: BundleItemBuilder<S>,
    verifier: MatchVerifier<C>,
    validator: AssetValidator<C>,
    packer: BundlePacker<C>,
    broadcaster: Arc<B>,
    drain: DrainConfig,
    /// Matches waiting for the next drain. Later events overwrite earlier work by id.
    queue: HashMap<MatchId, OrderMatch>,
    /// Ids removed upstream while their work was in flight; honored at stage boundaries.
    cancelled: HashSet<MatchId>,
    /// Stage per match currently owned by the executor.
    stages: HashMap<MatchId, Stage>,
    metrics: ExecutorMetrics,
}

impl<S, C, B> Pipeline<S, C, B>
where
    S: MatchStore + 'static,
    C: ChainApi + 'static,
    B: Broadcaster + 'static,
{
    fn on_event(&mut self, event: MatchEvent) {
        self.metrics.events.increment(1);
        match event {
            MatchEvent::Added(id, order_match) | MatchEvent::Modified(id, order_match) => {
                match self.stages.get(&id).copied() {
                    Some(Stage::Submitted) => {
                        // Already with the broadcaster; the terminal outcome settles this id
                        // and any surviving match is re-derived upstream.
                        debug!(%id, "ignoring event for a submitted match");
                    }
                    Some(stage) if stage != Stage::Discovered => {
                        // The fresh document supersedes the item in flight; only one of them
                        // may reach the broadcaster, so the old one is dropped at the next
                        // stage boundary.
                        debug!(%id, "match re-queued, superseding the in-flight item");
                        self.cancelled.insert(id.clone());
                        self.stages.insert(id.clone(), Stage::Discovered);
                        self.queue.insert(id, order_match);
                    }
                    _ => {
                        debug!(%id, "match queued");
                        self.stages.insert(id.clone(), Stage::Discovered);
                        self.queue.insert(id, order_match);
                    }
                }
            }
            MatchEvent::Removed(id) => {
                debug!(%id, "match removed");
                self.queue.remove(&id);
                match self.stages.get(&id).copied() {
                    Some(Stage::Discovered) => {
                        self.stages.remove(&id);
                    }
                    Some(_) => {
                        // Work is in flight; cancel it at the next stage boundary. The stage
                        // entry stays until the item is actually dropped.
                        self.cancelled.insert(id);
                    }
                    None => {}
                }
            }
        }
        self.metrics.in_flight.set(self.stages.len() as f64);
    }

    /// Absorbs every event already buffered on the subscription without blocking.
    ///
    /// Called at stage boundaries so removals arriving mid-batch cancel their item at the next
    /// suspension point instead of after the whole batch. Once the wind-down starts no new
    /// events are accepted.
    fn absorb_events(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<MatchEvent>,
        shutting_down: bool,
    ) {
        if shutting_down {
            return;
        }
        while let Ok(event) = events.try_recv() {
            self.on_event(event);
        }
    }

    /// Drains the queue and drives the batch through build, verify, validate, pack and submit.
    ///
    /// With `shutting_down` set, buffered events are left alone and deferred items are dropped
    /// instead of re-queued, so the queue is guaranteed to empty.
    #[instrument(skip_all, fields(chain_id = self.chain_id, batch = self.queue.len()))]
    async fn drain_queue(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<MatchEvent>,
        outcomes: &mut PendingOutcomes,
        shutting_down: bool,
    ) {
        if self.queue.is_empty() {
            return;
        }
        let batch: HashMap<MatchId, OrderMatch> = self.queue.drain().collect();
        self.metrics.batch_size.record(batch.len() as f64);

        let mut items = Vec::with_capacity(batch.len());
        for (id, order_match) in &batch {
            self.set_stage(id, Stage::Building);
            match self.builder.build(id, order_match).await {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(%id, %err, "failed to build bundle item");
                    self.reject(id.clone(), err.to_rejection()).await;
                }
            }
        }
        self.absorb_events(events, shutting_down);
        let items = self.discard_cancelled(items, |item| item.id().clone());

        for item in &items {
            self.set_stage(item.id(), Stage::Verifying);
        }
        let now = Utc::now().timestamp() as u64;
        let (items, rejected) = self.verifier.verify(items, now).await;
        self.absorb_events(events, shutting_down);
        self.reject_all(rejected).await;
        let items = self.discard_cancelled(items, |item| item.item.id().clone());

        for item in &items {
            self.set_stage(item.item.id(), Stage::AssetChecking);
        }
        let (items, rejected) = self.validator.validate(items).await;
        self.absorb_events(events, shutting_down);
        self.reject_all(rejected).await;
        let items = self.discard_cancelled(items, |item| item.item.id().clone());

        for item in &items {
            self.set_stage(item.item.id(), Stage::Packing);
        }
        let PackOutput { transactions, rejected, deferred } = self.packer.pack(items).await;
        self.absorb_events(events, shutting_down);
        self.reject_all(rejected).await;

        // Deferred items go back on the queue for the next drain, unless a fresher document
        // arrived while this batch was in flight or the executor is winding down.
        for item in deferred {
            let id = item.item.id().clone();
            if self.cancelled.remove(&id) {
                self.release(&id);
                continue;
            }
            if shutting_down {
                // The document stays active upstream; a later run picks it up again.
                debug!(%id, "dropping deferred match on shutdown");
                self.release(&id);
                continue;
            }
            if let Some(doc) = batch.get(&id) {
                self.set_stage(&id, Stage::Discovered);
                self.queue.entry(id).or_insert_with(|| doc.clone());
            }
        }

        for tx in transactions {
            let matches = tx.matches.clone();
            for id in &matches {
                self.set_stage(id, Stage::Submitted);
            }
            debug!(
                matches = matches.len(),
                gas_limit = tx.gas_limit,
                "handing bundle to the broadcaster"
            );
            self.metrics.bundles_submitted.increment(1);

            let outcome_rx = self.broadcaster.submit_transaction(tx);
            for id in &matches {
                let state = MatchState::progress("bundle submitted, awaiting confirmation");
                if let Err(err) = self.source.on_progress(id, &state).await {
                    warn!(%id, %err, "failed to write progress state");
                }
            }
            outcomes.push(Box::pin(async move {
                (matches, outcome_rx.await.unwrap_or(BundleOutcome::Reverted))
            }));
        }

        self.metrics.in_flight.set(self.stages.len() as f64);
    }

    async fn on_outcome(&mut self, matches: Vec<MatchId>, outcome: BundleOutcome) {
        match outcome {
            BundleOutcome::Completed => {
                self.metrics.matches_completed.increment(matches.len() as u64)
            }
            BundleOutcome::Reverted => self.metrics.bundles_reverted.increment(1),
        }

        for id in matches {
            let cancelled = self.cancelled.remove(&id);
            self.release(&id);
            if cancelled {
                // Removed or superseded while the bundle was in flight; nothing to write back.
                continue;
            }
            let result = match outcome {
                BundleOutcome::Completed => self.source.on_completed(&id).await,
                BundleOutcome::Reverted => self.source.on_reverted(&id).await,
            };
            if let Err(err) = result {
                warn!(%id, %err, "terminal write-back failed");
            }
        }
        self.metrics.in_flight.set(self.stages.len() as f64);
    }

    async fn reject(&mut self, id: MatchId, rejection: Rejection) {
        self.metrics.rejected.increment(1);
        self.release(&id);
        if self.cancelled.remove(&id) {
            // Removed or superseded upstream; the rejection has nowhere to go.
            return;
        }
        if let Err(err) = self.source.on_invalidated(&id, &rejection).await {
            warn!(%id, %err, "failed to persist rejection");
        }
    }

    async fn reject_all(&mut self, rejected: Vec<RejectedItem>) {
        for RejectedItem { item, rejection } in rejected {
            warn!(id = %item.id(), code = %rejection.code, reason = %rejection.message, "match rejected");
            self.reject(item.id().clone(), rejection).await;
        }
    }

    /// Drops items whose match was removed or superseded upstream, consuming the cancellation.
    fn discard_cancelled<T>(&mut self, items: Vec<T>, id_of: impl Fn(&T) -> MatchId) -> Vec<T> {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let id = id_of(&item);
            if self.cancelled.remove(&id) {
                debug!(%id, "match cancelled mid-pipeline");
                self.release(&id);
            } else {
                kept.push(item);
            }
        }
        kept
    }

    /// Gives up ownership of an id after its item was dropped or reached a terminal outcome.
    ///
    /// The stage entry is kept when a fresher document for the same id is already queued, since
    /// that document owns the id now.
    fn release(&mut self, id: &MatchId) {
        if !self.queue.contains_key(id) {
            self.stages.remove(id);
        }
    }

    fn set_stage(&mut self, id: &MatchId, stage: Stage) {
        if let Some(current) = self.stages.get_mut(id) {
            *current = stage;
        }
    }
}

/// Spawned executors, one per configured chain, sharing the store and broadcaster.
#[derive(Debug)]
pub struct Executors {
    executors: Vec<(ChainId, ExecutorHandle, JoinHandle<()>)>,
}

impl Executors {
    /// Builds a provider per configured chain and spawns an executor over it.
    pub async fn spawn<S, B>(config: ExecutorConfig, store: Arc<S>, broadcaster: Arc<B>) -> Self
    where
        S: MatchStore + 'static,
        B: Broadcaster + 'static,
    {
        let mut executors = Vec::with_capacity(config.chains.len());
        for chain_cfg in &config.chains {
            let provider = ProviderBuilder::new().connect_http(chain_cfg.endpoint.clone()).erased();
            let chain = Arc::new(
                RpcChainApi::new(provider, chain_cfg.exchange)
                    .with_timeout(config.drain.rpc_timeout),
            );

            let (executor, handle) =
                MatchExecutor::new(store.clone(), chain, broadcaster.clone(), chain_cfg, &config)
                    .await;
            let task = tokio::spawn(executor.run());
            info!(chain_id = chain_cfg.chain_id, "spawned match executor");
            executors.push((chain_cfg.chain_id, handle, task));
        }
        Self { executors }
    }

    /// Handle for the executor bound to `chain_id`.
    pub fn handle(&self, chain_id: ChainId) -> Option<&ExecutorHandle> {
        self.executors
            .iter()
            .find(|(id, _, _)| *id == chain_id)
            .map(|(_, handle, _)| handle)
    }

    /// Shuts every executor down, draining in-flight work.
    pub async fn shutdown(self) {
        for (chain_id, handle, task) in self.executors {
            handle.shutdown().await;
            let _ = task.await;
            debug!(chain_id, "executor stopped");
        }
    }
}
