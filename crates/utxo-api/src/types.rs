//! Blockbook v2 response shapes.
//!
//! Amounts arrive as base-unit decimal strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockbookUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: String,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub lock_time: Option<u64>,
    #[serde(default)]
    pub coinbase: Option<bool>,
}

/// `GET /api/v2/address/{address}?details=basic`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    pub address: String,
    pub balance: String,
    #[serde(default)]
    pub unconfirmed_balance: String,
    #[serde(default)]
    pub total_received: Option<String>,
    #[serde(default)]
    pub total_sent: Option<String>,
    #[serde(default)]
    pub txs: u64,
    #[serde(default)]
    pub unconfirmed_txs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxVout {
    pub value: String,
    pub n: u32,
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub spent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxVin {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// `GET /api/v2/tx/{txid}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockbookTx {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<TxVin>,
    #[serde(default)]
    pub vout: Vec<TxVout>,
    #[serde(default)]
    pub block_hash: Option<String>,
    /// Negative or zero while unconfirmed.
    #[serde(default)]
    pub block_height: i64,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub block_time: u64,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub fees: Option<String>,
    #[serde(default)]
    pub hex: Option<String>,
}

/// `GET /api/v2/block/{hashOrHeight}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub previous_block_hash: Option<String>,
    #[serde(default)]
    pub next_block_hash: Option<String>,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub tx_count: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// `{"result": ...}` envelope used by `sendtx` and `estimatefee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultResponse {
    pub result: String,
}

/// `{"error": ...}` body returned on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Message(String),
    Object { message: String },
}

impl ErrorBody {
    pub fn message(&self) -> &str {
        match self {
            ErrorBody::Message(m) => m,
            ErrorBody::Object { message } => message,
        }
    }
}
