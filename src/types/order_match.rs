//! Match documents as stored in the `orderMatches` collection.

use super::order::NftToken;
use crate::error::{Rejection, RejectionCode};
use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Identifier of a match document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Creates a new [`MatchId`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// How a match executes against the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// N-NFT match through `matchOrders`, with a constructed buy-side order.
    MatchOrders,
    /// Direct listing/offer pair through `matchOneToOneOrders`.
    MatchOneToOneOrders,
}

/// Lifecycle status of a match document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Not yet eligible for execution.
    Inactive,
    /// Eligible. The executor only ever observes matches in this status.
    #[default]
    Active,
    /// Fulfilled on chain.
    Matched,
    /// Rejected, with the code persisted alongside.
    Error,
}

/// Lifecycle state persisted under `state` on the match document.
///
/// Write-backs merge this into the document, so optional fields are only serialized when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    /// Current status.
    pub status: MatchStatus,
    /// Rejection code, set when `status` is [`MatchStatus::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<RejectionCode>,
    /// Error context, set when `status` is [`MatchStatus::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form progress note for intermediate telemetry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatchState {
    /// State for a match rejected with `rejection`.
    pub fn rejected(rejection: &Rejection) -> Self {
        Self {
            status: MatchStatus::Error,
            code: Some(rejection.code),
            error: Some(rejection.message.clone()),
            message: None,
        }
    }

    /// Progress payload carrying a telemetry note, status unchanged.
    pub fn progress(message: impl Into<String>) -> Self {
        Self { status: MatchStatus::Active, code: None, error: None, message: Some(message.into()) }
    }

    /// Whether the rejection code matches.
    pub fn has_code(&self, code: RejectionCode) -> bool {
        self.code == Some(code)
    }
}

/// Which NFTs a match covers, keyed by collection address, then by token id.
///
/// A collection with no token entries denotes a collection-level match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchData {
    /// The NFT tree.
    #[serde(default)]
    pub order_items: BTreeMap<Address, BTreeMap<String, NftToken>>,
}

/// A match document: order references plus execution metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMatch {
    /// Ids (hashes) of the referenced orders. One listing and one offer for a valid match.
    #[serde(rename = "ids")]
    pub order_ids: Vec<B256>,
    /// NFTs covered by the match.
    #[serde(default)]
    pub match_data: MatchData,
    /// Execution path.
    #[serde(rename = "type")]
    pub ty: MatchType,
    /// Lifecycle state.
    #[serde(default)]
    pub state: MatchState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_state_carries_code_and_error() {
        let rejection = Rejection::new(RejectionCode::OrderInvalid, "stale pair");
        let state = MatchState::rejected(&rejection);
        assert_eq!(state.status, MatchStatus::Error);
        assert!(state.has_code(RejectionCode::OrderInvalid));
        assert_eq!(state.error.as_deref(), Some("stale pair"));
    }

    #[test]
    fn optional_state_fields_are_omitted_from_the_wire() {
        let encoded = serde_json::to_string(&MatchState::default()).unwrap();
        assert_eq!(encoded, "{\"status\":\"Active\"}");
    }
}
