//! UTXO-chain transaction construction for the payments engine.
//!
//! Provides base/main unit conversion, UTXO ordering, size-based fee
//! estimation, the coin-selection builder that produces a [`types::PaymentTx`],
//! and a signing hook that turns a payment into a broadcastable transaction.

pub mod address;
pub mod error;
pub mod fee;
pub mod network;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod units;
pub mod utxo;
