//! Handoff interface to the external transaction broadcaster.

use crate::packer::BundleTransaction;
use std::fmt::Debug;
use tokio::sync::oneshot;

/// Terminal outcome of a submitted bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOutcome {
    /// The bundle landed; the matches in it are fulfilled.
    Completed,
    /// The bundle reverted; the matches are re-derived upstream if still valid.
    Reverted,
}

/// Submits encoded bundles to the network.
///
/// Submission is fire-and-forget; the returned receiver resolves exactly once with the terminal
/// outcome for the whole bundle. A dropped sender counts as [`BundleOutcome::Reverted`].
pub trait Broadcaster: Debug + Send + Sync {
    /// Hands a bundle transaction off for submission.
    fn submit_transaction(&self, tx: BundleTransaction) -> oneshot::Receiver<BundleOutcome>;
}
