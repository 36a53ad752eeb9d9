use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason code attached to a match rejected by the pipeline.
///
/// Codes are persisted on the match document, so variants serialize under the exact names the
/// rest of the system expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionCode {
    /// The exchange rejected the order pair, or a referenced order could not be resolved.
    OrderInvalid,
    /// The seller has not approved the exchange operator on the collection.
    NotApprovedToTransferToken,
    /// The seller no longer owns the token.
    InsufficientTokenBalance,
    /// The buyer has not approved enough currency to the exchange.
    InsufficientCurrencyAllowance,
    /// The buyer balance does not cover the expected cost.
    InsufficientCurrencyBalance,
    /// The match references more than one listing or more than one offer.
    MultipleOrdersUnsupported,
    /// No bundle size packs the item under the gas ceiling.
    BundleTooLarge,
    /// Unclassified failure, including RPC transport errors and timeouts.
    UnknownError,
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A typed rejection surfaced to the match source when an item leaves the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Rejection {
    /// Reason code persisted on the match document.
    pub code: RejectionCode,
    /// Human-readable context.
    pub message: String,
}

impl Rejection {
    /// Creates a new [`Rejection`].
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Creates a [`RejectionCode::UnknownError`] rejection from an arbitrary error.
    pub fn unknown(err: impl fmt::Display) -> Self {
        Self::new(RejectionCode::UnknownError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_under_their_wire_names() {
        for (code, expected) in [
            (RejectionCode::OrderInvalid, "\"OrderInvalid\""),
            (RejectionCode::NotApprovedToTransferToken, "\"NotApprovedToTransferToken\""),
            (RejectionCode::InsufficientTokenBalance, "\"InsufficientTokenBalance\""),
            (RejectionCode::InsufficientCurrencyAllowance, "\"InsufficientCurrencyAllowance\""),
            (RejectionCode::InsufficientCurrencyBalance, "\"InsufficientCurrencyBalance\""),
            (RejectionCode::MultipleOrdersUnsupported, "\"MultipleOrdersUnsupported\""),
            (RejectionCode::BundleTooLarge, "\"BundleTooLarge\""),
            (RejectionCode::UnknownError, "\"UnknownError\""),
        ] {
            assert_eq!(serde_json::to_string(&code).unwrap(), expected);
        }
    }
}
