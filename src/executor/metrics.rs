use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics for the match executor.
#[derive(Metrics)]
#[metrics(scope = "executor")]
pub(crate) struct ExecutorMetrics {
    /// Number of match events received.
    pub events: Counter,
    /// Number of matches rejected with a typed code.
    pub rejected: Counter,
    /// Number of bundles handed to the broadcaster.
    pub bundles_submitted: Counter,
    /// Number of bundles that reverted.
    pub bundles_reverted: Counter,
    /// Number of matches settled on chain.
    pub matches_completed: Counter,
    /// Matches queued or in flight.
    pub in_flight: Gauge,
    /// Number of matches drained per batch.
    pub batch_size: Histogram,
}
