//! Executor constants.

use std::time::Duration;

/// Deadline applied to every chain RPC call. Exceeding it counts as an unclassified failure.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval at which the executor drains its work queue into a batch.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(3);

/// Queue size that triggers a drain ahead of the tick.
pub const DEFAULT_DRAIN_WATERMARK: usize = 64;

/// Default per-transaction gas ceiling enforced by the packer.
///
/// Matches the mainnet block gas limit; any bundle estimating above this could never land.
pub const DEFAULT_MAX_GAS_LIMIT: u64 = 30_000_000;

/// Default floor below which a batch is not submitted.
pub const DEFAULT_MIN_BUNDLE_SIZE: usize = 1;

/// Initial delay between match subscription attempts.
pub const SUBSCRIBE_BACKOFF_INITIAL: Duration = Duration::from_millis(500);

/// Ceiling on the match subscription backoff.
pub const SUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(60);
