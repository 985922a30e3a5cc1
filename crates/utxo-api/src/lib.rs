//! Access to a Blockbook-compatible UTXO indexer.
//!
//! [`UtxoApi`] is the surface the payments engine needs. [`BlockbookClient`]
//! implements it over HTTP and [`RetryingApi`] wraps any implementation with
//! bounded retry on transient failures.

pub mod api;
pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use api::UtxoApi;
pub use client::BlockbookClient;
pub use error::ApiError;
pub use retry::RetryingApi;
