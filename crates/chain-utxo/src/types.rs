use serde::{Deserialize, Serialize};

use crate::error::UtxoError;
use crate::units;

/// An unspent output as reported by the indexer.
///
/// `value` is in the main denomination. When `satoshis` is present it is
/// authoritative for the base-unit amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoInfo {
    pub txid: String,
    pub vout: u32,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satoshis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_pub_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent: Option<bool>,
}

impl UtxoInfo {
    /// Value of this output in base units.
    pub fn value_base(&self, decimals: u32) -> Result<u64, UtxoError> {
        match self.satoshis {
            Some(sat) => Ok(sat),
            None => units::to_base(&self.value, decimals),
        }
    }

    /// Confirmation count, treating a missing value as unconfirmed.
    pub fn confirmation_count(&self) -> u32 {
        self.confirmations.unwrap_or(0)
    }
}

/// A requested payment destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeRateType {
    /// Flat fee in the main denomination.
    #[serde(rename = "main")]
    Main,
    /// Flat fee in base units.
    #[serde(rename = "base")]
    Base,
    /// Base units per vbyte, multiplied by the estimated size.
    #[serde(rename = "base/weight")]
    BasePerWeight,
}

impl std::fmt::Display for FeeRateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeRateType::Main => write!(f, "main"),
            FeeRateType::Base => write!(f, "base"),
            FeeRateType::BasePerWeight => write!(f, "base/weight"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeLevel {
    Custom,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for FeeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeLevel::Custom => write!(f, "custom"),
            FeeLevel::Low => write!(f, "low"),
            FeeLevel::Medium => write!(f, "medium"),
            FeeLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRate {
    pub fee_rate: String,
    pub fee_rate_type: FeeRateType,
}

impl FeeRate {
    pub fn new(fee_rate: impl Into<String>, fee_rate_type: FeeRateType) -> Self {
        Self {
            fee_rate: fee_rate.into(),
            fee_rate_type,
        }
    }

    pub fn per_weight(sat_per_vbyte: impl Into<String>) -> Self {
        Self::new(sat_per_vbyte, FeeRateType::BasePerWeight)
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.fee_rate, self.fee_rate_type)
    }
}

/// The canonical result of coin selection, ready for a signer.
///
/// Holds `sum(inputs) == sum(outputs) + fee` in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTx {
    pub inputs: Vec<UtxoInfo>,
    pub outputs: Vec<TxOutput>,
    pub fee: String,
    pub change: String,
    pub change_address: Option<String>,
}
