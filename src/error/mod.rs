//! Executor error types.

mod rejection;
pub use rejection::{Rejection, RejectionCode};

use alloy::{
    primitives::{B256, ChainId},
    transports::{RpcError, TransportErrorKind},
};
use std::time::Duration;
use thiserror::Error;

/// Errors talking to the match datastore.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The subscription or write transport failed.
    #[error(transparent)]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A stored document has an unexpected shape.
    #[error("malformed document {id}: {reason}")]
    Malformed {
        /// Id of the offending document.
        id: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors from chain RPC reads.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC transport error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),

    /// Contract call error.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),

    /// The call exceeded its deadline.
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
}

impl ChainError {
    /// Maps the failure to the rejection persisted on the match document.
    pub fn to_rejection(&self) -> Rejection {
        Rejection::unknown(self)
    }
}

/// Errors constructing a bundle item from a match document.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An order referenced by the match is missing from the datastore.
    #[error("order {0} referenced by the match is missing")]
    OrderMissing(B256),

    /// The match references no listing order.
    #[error("match references no listing order")]
    MissingListing,

    /// The match references no offer order.
    #[error("match references no offer order")]
    MissingOffer,

    /// The match references more than one order per side.
    #[error("match references {listings} listings and {offers} offers")]
    MultipleOrdersUnsupported {
        /// Number of referenced sell orders.
        listings: usize,
        /// Number of referenced buy orders.
        offers: usize,
    },

    /// An order targets a different chain than the executor is bound to.
    #[error("order {order} targets chain {actual}, executor is bound to chain {expected}")]
    ChainMismatch {
        /// The offending order.
        order: B256,
        /// Chain id carried by the order.
        actual: ChainId,
        /// Chain id the executor is bound to.
        expected: ChainId,
    },

    /// Datastore failure while resolving the referenced orders.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl BuildError {
    /// Maps the build failure to the rejection persisted on the match document.
    pub fn to_rejection(&self) -> Rejection {
        let code = match self {
            Self::MultipleOrdersUnsupported { .. } => RejectionCode::MultipleOrdersUnsupported,
            Self::OrderMissing(_)
            | Self::MissingListing
            | Self::MissingOffer
            | Self::ChainMismatch { .. } => RejectionCode::OrderInvalid,
            Self::Source(_) => RejectionCode::UnknownError,
        };
        Rejection::new(code, self.to_string())
    }
}

/// The executor overarching error type.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Errors talking to the match datastore.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Errors from chain reads.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// An error occurred during ABI encoding/decoding.
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),

    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}
