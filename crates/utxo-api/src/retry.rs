use std::future::Future;

use async_trait::async_trait;
use chain_utxo::types::UtxoInfo;
use tracing::warn;

use crate::api::UtxoApi;
use crate::error::ApiError;
use crate::types::{AddressDetails, BlockInfo, BlockbookTx};

/// Retries after the first attempt, for four attempts in total.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Run `op`, retrying immediately while it fails with a transient error.
///
/// Non-transient errors are returned on first failure. Once retries are
/// exhausted the last error is returned unchanged.
pub async fn with_retries<T, F, Fut>(name: &str, max_retries: u32, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(op = name, attempt, max_retries, error = %err, "transient api error, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Wraps a [`UtxoApi`] so every call gets bounded transient retry.
pub struct RetryingApi<A> {
    inner: A,
    max_retries: u32,
}

impl<A: UtxoApi> RetryingApi<A> {
    pub fn new(inner: A) -> Self {
        Self::with_max_retries(inner, DEFAULT_MAX_RETRIES)
    }

    pub fn with_max_retries(inner: A, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: UtxoApi> UtxoApi for RetryingApi<A> {
    async fn get_utxos_for_address(&self, address: &str) -> Result<Vec<UtxoInfo>, ApiError> {
        with_retries("get_utxos_for_address", self.max_retries, move || {
            self.inner.get_utxos_for_address(address)
        })
        .await
    }

    async fn get_address_details(&self, address: &str) -> Result<AddressDetails, ApiError> {
        with_retries("get_address_details", self.max_retries, move || {
            self.inner.get_address_details(address)
        })
        .await
    }

    async fn get_tx(&self, txid: &str) -> Result<BlockbookTx, ApiError> {
        with_retries("get_tx", self.max_retries, move || self.inner.get_tx(txid)).await
    }

    async fn send_tx(&self, tx_hex: &str) -> Result<String, ApiError> {
        with_retries("send_tx", self.max_retries, move || self.inner.send_tx(tx_hex)).await
    }

    async fn get_block(&self, hash_or_height: &str) -> Result<BlockInfo, ApiError> {
        with_retries("get_block", self.max_retries, move || {
            self.inner.get_block(hash_or_height)
        })
        .await
    }

    async fn estimate_fee(&self, blocks: u32) -> Result<String, ApiError> {
        with_retries("estimate_fee", self.max_retries, move || self.inner.estimate_fee(blocks)).await
    }
}
