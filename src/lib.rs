//! # Match Executor
//!
//! Order-match transaction pipeline for the exchange: watches the match datastore for active
//! matches, validates them against live chain state, packs the survivors into gas-bounded
//! bundles and hands the encoded transactions to the broadcaster, reporting every terminal
//! outcome back to the datastore.

pub mod broadcast;
pub mod builder;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod packer;
pub mod serde;
pub mod source;
pub mod types;
pub mod validation;
pub mod verifier;
