//! Configuration for a payments account

use std::path::Path;
use std::time::Duration;

use chain_utxo::address::AddressType;
use chain_utxo::network::{BtcNetwork, ChainPolicy};
use chain_utxo::types::FeeRate;
use chain_utxo::units;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::hd_derivation;

/// Configuration for a payments account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentsConfig {
    pub network: BtcNetwork,

    pub address_type: AddressType,

    /// Account index used to build the default derivation path
    pub account_index: u32,

    /// Explicit account path; overrides `account_index`
    pub derivation_path: Option<String>,

    /// Blockbook endpoint; defaults to the network's public instance
    pub blockbook_url: Option<String>,

    /// Dust threshold override in base units
    pub dust_threshold: Option<u64>,

    /// Minimum relay fee override in base units
    pub network_min_relay_fee: Option<u64>,

    /// Fee floor override
    pub min_tx_fee: Option<FeeRate>,

    /// Hard cap on the signed transaction's fee rate, in sat/vbyte
    pub maximum_fee_rate: Option<String>,

    /// How many indices `get_address_index` scans
    pub max_address_scan: u32,

    pub request_timeout_secs: u64,

    /// Retries on transient indexer errors
    pub max_retries: u32,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            network: BtcNetwork::Mainnet,
            address_type: AddressType::P2wpkh,
            account_index: 0,
            derivation_path: None,
            blockbook_url: None,
            dust_threshold: None,
            network_min_relay_fee: None,
            min_tx_fee: None,
            maximum_fee_rate: None,
            max_address_scan: 10,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl PaymentsConfig {
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn builder() -> PaymentsConfigBuilder {
        PaymentsConfigBuilder::new()
    }

    /// Reject values that would only fail later, mid-transaction.
    pub fn validate(&self) -> Result<(), WalletError> {
        self.maximum_fee_rate()?;
        if let Some(min_fee) = &self.min_tx_fee {
            let rate = units::parse_decimal(&min_fee.fee_rate)?;
            if rate.is_sign_negative() {
                return Err(WalletError::Config(format!("minTxFee must not be negative: {min_fee}")));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(WalletError::Config("requestTimeoutSecs must be positive".into()));
        }
        Ok(())
    }

    pub fn account_path(&self, coin_type: u32) -> String {
        match &self.derivation_path {
            Some(path) => path.clone(),
            None => hd_derivation::default_account_path(self.address_type, coin_type, self.account_index),
        }
    }

    pub fn maximum_fee_rate(&self) -> Result<Option<Decimal>, WalletError> {
        match &self.maximum_fee_rate {
            None => Ok(None),
            Some(raw) => {
                let rate = units::parse_decimal(raw)?;
                if rate <= Decimal::ZERO {
                    return Err(WalletError::Config(format!(
                        "maximumFeeRate must be positive, got {raw}"
                    )));
                }
                Ok(Some(rate))
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Chain policy for `network` with this config's overrides applied.
    pub fn policy(&self) -> ChainPolicy {
        let mut policy = ChainPolicy::bitcoin(self.network);
        if let Some(dust) = self.dust_threshold {
            policy.dust_threshold = dust;
        }
        if let Some(relay) = self.network_min_relay_fee {
            policy.network_min_relay_fee = relay;
        }
        if let Some(min_fee) = &self.min_tx_fee {
            policy.min_tx_fee = min_fee.clone();
        }
        policy
    }

    pub fn blockbook_url(&self, policy: &ChainPolicy) -> Result<String, WalletError> {
        self.blockbook_url
            .clone()
            .or_else(|| policy.default_blockbook_url.map(str::to_string))
            .ok_or_else(|| {
                WalletError::Config(format!("no blockbook url configured for {}", policy.network))
            })
    }
}

/// Builder for PaymentsConfig
#[derive(Debug, Default)]
pub struct PaymentsConfigBuilder {
    config: PaymentsConfig,
}

impl PaymentsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(mut self, network: BtcNetwork) -> Self {
        self.config.network = network;
        self
    }

    pub fn address_type(mut self, address_type: AddressType) -> Self {
        self.config.address_type = address_type;
        self
    }

    pub fn account_index(mut self, index: u32) -> Self {
        self.config.account_index = index;
        self
    }

    pub fn derivation_path(mut self, path: impl Into<String>) -> Self {
        self.config.derivation_path = Some(path.into());
        self
    }

    pub fn blockbook_url(mut self, url: impl Into<String>) -> Self {
        self.config.blockbook_url = Some(url.into());
        self
    }

    pub fn dust_threshold(mut self, sat: u64) -> Self {
        self.config.dust_threshold = Some(sat);
        self
    }

    pub fn network_min_relay_fee(mut self, sat: u64) -> Self {
        self.config.network_min_relay_fee = Some(sat);
        self
    }

    pub fn min_tx_fee(mut self, fee: FeeRate) -> Self {
        self.config.min_tx_fee = Some(fee);
        self
    }

    pub fn maximum_fee_rate(mut self, sat_per_vbyte: impl Into<String>) -> Self {
        self.config.maximum_fee_rate = Some(sat_per_vbyte.into());
        self
    }

    pub fn max_address_scan(mut self, count: u32) -> Self {
        self.config.max_address_scan = count;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn build(self) -> Result<PaymentsConfig, WalletError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
