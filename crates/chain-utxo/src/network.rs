use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::types::{FeeLevel, FeeRate};

/// Default Blockbook endpoint for Bitcoin mainnet.
pub const MAINNET_BLOCKBOOK: &str = "https://btc1.trezor.io";

/// Default Blockbook endpoint for Bitcoin testnet.
pub const TESTNET_BLOCKBOOK: &str = "https://tbtc1.trezor.io";

/// Outputs at or below this many satoshis are considered dust.
pub const DEFAULT_DUST_THRESHOLD: u64 = 546;

/// Confirmations needed before a UTXO is treated as mature.
pub const MATURE_CONFIRMATIONS: u32 = 6;

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl BtcNetwork {
    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BtcNetwork::Mainnet => Network::Bitcoin,
            BtcNetwork::Testnet => Network::Testnet,
            BtcNetwork::Signet => Network::Signet,
            BtcNetwork::Regtest => Network::Regtest,
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, BtcNetwork::Mainnet)
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
            BtcNetwork::Signet => write!(f, "signet"),
            BtcNetwork::Regtest => write!(f, "regtest"),
        }
    }
}

impl std::str::FromStr for BtcNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(BtcNetwork::Mainnet),
            "testnet" | "test" => Ok(BtcNetwork::Testnet),
            "signet" => Ok(BtcNetwork::Signet),
            "regtest" => Ok(BtcNetwork::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Per-chain constants consumed by the shared transaction builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPolicy {
    pub name: &'static str,
    pub symbol: &'static str,
    pub network: BtcNetwork,
    pub decimals: u32,
    pub dust_threshold: u64,
    /// Minimum absolute fee nodes will relay, in base units.
    pub network_min_relay_fee: u64,
    pub min_tx_fee: FeeRate,
    /// BIP44 coin type used in default derivation paths.
    pub coin_type: u32,
    pub default_blockbook_url: Option<&'static str>,
    /// Fallback sat/vbyte rates for Low, Medium and High.
    fee_table: [u64; 3],
    /// Blockbook confirmation targets for Low, Medium and High.
    fee_targets: [u32; 3],
}

impl ChainPolicy {
    pub fn bitcoin(network: BtcNetwork) -> Self {
        match network {
            BtcNetwork::Mainnet => Self {
                name: "Bitcoin",
                symbol: "BTC",
                network,
                decimals: 8,
                dust_threshold: DEFAULT_DUST_THRESHOLD,
                network_min_relay_fee: 1_000,
                min_tx_fee: FeeRate::per_weight("1"),
                coin_type: 0,
                default_blockbook_url: Some(MAINNET_BLOCKBOOK),
                fee_table: [5, 20, 50],
                fee_targets: [24, 6, 2],
            },
            BtcNetwork::Testnet | BtcNetwork::Signet | BtcNetwork::Regtest => Self {
                name: "Bitcoin Testnet",
                symbol: "TBTC",
                network,
                decimals: 8,
                dust_threshold: DEFAULT_DUST_THRESHOLD,
                network_min_relay_fee: 1_000,
                min_tx_fee: FeeRate::per_weight("1"),
                coin_type: 1,
                default_blockbook_url: match network {
                    BtcNetwork::Testnet => Some(TESTNET_BLOCKBOOK),
                    _ => None,
                },
                fee_table: [1, 5, 10],
                fee_targets: [24, 6, 2],
            },
        }
    }

    /// Hardcoded sat/vbyte rate for a fee level.
    ///
    /// `Custom` has no table entry and resolves to the medium rate.
    pub fn default_fee_rate(&self, level: FeeLevel) -> FeeRate {
        let sat = match level {
            FeeLevel::Low => self.fee_table[0],
            FeeLevel::Medium | FeeLevel::Custom => self.fee_table[1],
            FeeLevel::High => self.fee_table[2],
        };
        FeeRate::per_weight(sat.to_string())
    }

    /// Number of blocks to target when asking an indexer for a fee estimate.
    pub fn confirmation_target(&self, level: FeeLevel) -> u32 {
        match level {
            FeeLevel::Low => self.fee_targets[0],
            FeeLevel::Medium | FeeLevel::Custom => self.fee_targets[1],
            FeeLevel::High => self.fee_targets[2],
        }
    }

    pub fn bitcoin_network(&self) -> Network {
        self.network.to_bitcoin_network()
    }
}
