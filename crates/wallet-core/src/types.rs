use chain_utxo::address::AddressType;
use chain_utxo::network::BtcNetwork;
use chain_utxo::types::{FeeLevel, FeeRate, FeeRateType, PaymentTx, UtxoInfo};
use serde::{Deserialize, Serialize};

/// A resolved spend target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payport {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_id: Option<String>,
}

impl Payport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            extra_id: None,
        }
    }
}

/// Anything that can be turned into a [`Payport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayportTarget {
    Index(u32),
    Address(String),
    Payport(Payport),
}

impl From<u32> for PayportTarget {
    fn from(index: u32) -> Self {
        PayportTarget::Index(index)
    }
}

impl From<&str> for PayportTarget {
    fn from(address: &str) -> Self {
        PayportTarget::Address(address.to_string())
    }
}

impl From<String> for PayportTarget {
    fn from(address: String) -> Self {
        PayportTarget::Address(address)
    }
}

impl From<Payport> for PayportTarget {
    fn from(payport: Payport) -> Self {
        PayportTarget::Payport(payport)
    }
}

/// `from`/`to` after resolution, with the account index when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromTo {
    pub from_address: String,
    pub from_index: Option<u32>,
    pub to_address: String,
    pub to_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Unsigned,
    Signed,
    Pending,
    Confirmed,
    Failed,
}

/// A fee request: a level to look up, or an explicit rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeeOption {
    Custom(FeeRate),
    Level(FeeLevel),
}

impl Default for FeeOption {
    fn default() -> Self {
        FeeOption::Level(FeeLevel::Medium)
    }
}

/// Outcome of turning a [`FeeOption`] into a concrete rate.
///
/// `fee_base`/`fee_main` are only known up front for flat fees; per-weight
/// rates are priced during coin selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFeeOption {
    pub target_fee_level: FeeLevel,
    pub target_fee_rate: String,
    pub target_fee_rate_type: FeeRateType,
    pub fee_base: Option<String>,
    pub fee_main: Option<String>,
}

impl ResolvedFeeOption {
    pub fn fee_rate(&self) -> FeeRate {
        FeeRate::new(self.target_fee_rate.clone(), self.target_fee_rate_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTransactionOptions {
    pub fee: FeeOption,
    pub use_all_utxos: bool,
    pub use_unconfirmed_utxos: bool,
    /// Spend from exactly these UTXOs instead of fetching them.
    pub available_utxos: Option<Vec<UtxoInfo>>,
}

impl CreateTransactionOptions {
    pub fn with_fee(mut self, fee: FeeOption) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_unconfirmed(mut self) -> Self {
        self.use_unconfirmed_utxos = true;
        self
    }

    pub fn with_utxos(mut self, utxos: Vec<UtxoInfo>) -> Self {
        self.available_utxos = Some(utxos);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    pub status: TransactionStatus,
    pub from_address: String,
    pub from_index: Option<u32>,
    pub to_address: String,
    pub to_index: Option<u32>,
    pub amount: String,
    pub fee: String,
    pub target_fee_level: FeeLevel,
    pub target_fee_rate: String,
    pub target_fee_rate_type: FeeRateType,
    pub input_utxos: Vec<UtxoInfo>,
    pub data: PaymentTx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTx {
    pub status: TransactionStatus,
    pub id: String,
    pub from_address: String,
    pub from_index: Option<u32>,
    pub to_address: String,
    pub to_index: Option<u32>,
    pub amount: String,
    pub fee: String,
    pub target_fee_level: FeeLevel,
    pub target_fee_rate: String,
    pub target_fee_rate_type: FeeRateType,
    pub input_utxos: Vec<UtxoInfo>,
    /// Raw transaction hex.
    pub hex: String,
    pub data: PaymentTx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResult {
    pub confirmed_balance: String,
    /// Mempool delta; negative while spends are unconfirmed.
    pub unconfirmed_balance: String,
    pub sweepable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    pub status: TransactionStatus,
    pub confirmations: u32,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub block_time: Option<u64>,
    /// Fee in the main denomination, when reported.
    pub fee: Option<String>,
    pub raw_hex: Option<String>,
}

/// Account configuration safe to share: no private material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub network: BtcNetwork,
    pub address_type: AddressType,
    pub derivation_path: String,
    pub xpub: String,
}
