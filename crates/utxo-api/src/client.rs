//! Blockbook v2 HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use chain_utxo::types::UtxoInfo;
use chain_utxo::units;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::UtxoApi;
use crate::error::ApiError;
use crate::types::{
    AddressDetails, BlockInfo, BlockbookTx, BlockbookUtxo, ErrorResponse, ResultResponse,
};

/// Coinbase outputs are unspendable until this many confirmations.
pub const COINBASE_MATURITY: u32 = 100;

/// Async client for a Blockbook indexer.
pub struct BlockbookClient {
    api_base: String,
    decimals: u32,
    client: reqwest::Client,
}

impl BlockbookClient {
    /// Create a client for `api_base` (e.g. `https://btc1.trezor.io`).
    pub fn new(api_base: &str, decimals: u32, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            decimals,
            client,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => err.error.message().to_string(),
                Err(_) => body,
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::ParseResponse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        debug!(%url, "blockbook GET");
        let response = self.client.get(&url).send().await?;
        Self::read_json(response).await
    }
}

/// Convert an indexer UTXO into the engine's representation.
///
/// Returns `None` for coinbase outputs that are not yet spendable.
pub fn utxo_from_blockbook(
    utxo: BlockbookUtxo,
    address: &str,
    decimals: u32,
) -> Result<Option<UtxoInfo>, ApiError> {
    if utxo.coinbase == Some(true) && utxo.confirmations < COINBASE_MATURITY {
        return Ok(None);
    }
    let satoshis: u64 = utxo
        .value
        .parse()
        .map_err(|e| ApiError::ParseResponse(format!("utxo value {:?}: {e}", utxo.value)))?;

    Ok(Some(UtxoInfo {
        txid: utxo.txid,
        vout: utxo.vout,
        value: units::to_main(satoshis, decimals),
        satoshis: Some(satoshis),
        confirmations: Some(utxo.confirmations),
        height: utxo.height.map(|h| h.to_string()),
        lock_time: utxo.lock_time.map(|l| l.to_string()),
        address: Some(address.to_string()),
        script_pub_key_hex: None,
        tx_hex: None,
        spent: Some(false),
    }))
}

#[async_trait]
impl UtxoApi for BlockbookClient {
    async fn get_utxos_for_address(&self, address: &str) -> Result<Vec<UtxoInfo>, ApiError> {
        let raw: Vec<BlockbookUtxo> = self.get_json(&format!("utxo/{address}")).await?;
        let mut utxos = Vec::with_capacity(raw.len());
        for utxo in raw {
            if let Some(info) = utxo_from_blockbook(utxo, address, self.decimals)? {
                utxos.push(info);
            }
        }
        Ok(utxos)
    }

    async fn get_address_details(&self, address: &str) -> Result<AddressDetails, ApiError> {
        self.get_json(&format!("address/{address}?details=basic")).await
    }

    async fn get_tx(&self, txid: &str) -> Result<BlockbookTx, ApiError> {
        self.get_json(&format!("tx/{txid}")).await
    }

    async fn send_tx(&self, tx_hex: &str) -> Result<String, ApiError> {
        let url = self.endpoint("sendtx/");
        let response = self
            .client
            .post(&url)
            .body(tx_hex.to_string())
            .send()
            .await?;
        let result: ResultResponse = Self::read_json(response).await?;
        if result.result.is_empty() {
            return Err(ApiError::MissingField("result".into()));
        }
        Ok(result.result)
    }

    async fn get_block(&self, hash_or_height: &str) -> Result<BlockInfo, ApiError> {
        self.get_json(&format!("block/{hash_or_height}")).await
    }

    async fn estimate_fee(&self, blocks: u32) -> Result<String, ApiError> {
        let result: ResultResponse = self.get_json(&format!("estimatefee/{blocks}")).await?;
        Ok(result.result)
    }
}
