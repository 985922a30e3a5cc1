use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::{CompressedPublicKey, ScriptBuf};
use serde::{Deserialize, Serialize};

use crate::error::UtxoError;
use crate::network::BtcNetwork;

/// Script type used when rendering a public key as an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    /// Legacy pay-to-pubkey-hash (`1...`).
    P2pkh,
    /// P2WPKH nested in P2SH (`3...`).
    P2shP2wpkh,
    /// Native SegWit (`bc1q...`).
    P2wpkh,
}

impl AddressType {
    /// Whether inputs of this type carry witness data.
    pub fn is_segwit(self) -> bool {
        !matches!(self, AddressType::P2pkh)
    }

    /// BIP purpose field for the default derivation path.
    pub fn purpose(self) -> u32 {
        match self {
            AddressType::P2pkh => 44,
            AddressType::P2shP2wpkh => 49,
            AddressType::P2wpkh => 84,
        }
    }

    /// Four-letter extended public key prefix for this script type.
    pub fn xpub_prefix(self, network: BtcNetwork) -> &'static str {
        match (self, network.is_mainnet()) {
            (AddressType::P2pkh, true) => "xpub",
            (AddressType::P2shP2wpkh, true) => "ypub",
            (AddressType::P2wpkh, true) => "zpub",
            (AddressType::P2pkh, false) => "tpub",
            (AddressType::P2shP2wpkh, false) => "upub",
            (AddressType::P2wpkh, false) => "vpub",
        }
    }
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressType::P2pkh => write!(f, "p2pkh"),
            AddressType::P2shP2wpkh => write!(f, "p2sh-p2wpkh"),
            AddressType::P2wpkh => write!(f, "p2wpkh"),
        }
    }
}

/// Render a 33-byte compressed secp256k1 public key as an address.
pub fn pubkey_to_address(
    pubkey_bytes: &[u8; 33],
    address_type: AddressType,
    network: BtcNetwork,
) -> Result<String, UtxoError> {
    let compressed_pk = CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        UtxoError::InvalidPublicKey(format!("failed to parse compressed public key: {e}"))
    })?;
    let net = network.to_bitcoin_network();

    let address = match address_type {
        AddressType::P2pkh => Address::p2pkh(compressed_pk.pubkey_hash(), net),
        AddressType::P2shP2wpkh => Address::p2shwpkh(&compressed_pk, net),
        AddressType::P2wpkh => Address::p2wpkh(&compressed_pk, net),
    };

    Ok(address.to_string())
}

/// Parse an address and require it to belong to `network`.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, UtxoError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| UtxoError::InvalidAddress(format!("{address}: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| UtxoError::InvalidAddress(format!("{address}: {e}")))
}

/// Validate a Bitcoin address string for the given network.
///
/// Returns `true` if the address is valid for the specified network,
/// `false` if it is valid but for a different network.
pub fn validate_address(address: &str, network: BtcNetwork) -> Result<bool, UtxoError> {
    let parsed = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| UtxoError::InvalidAddress(format!("failed to parse address: {e}")))?;

    Ok(parsed.is_valid_for_network(network.to_bitcoin_network()))
}

/// The locking script paying to `address`.
pub fn script_pubkey_for(address: &str, network: BtcNetwork) -> Result<ScriptBuf, UtxoError> {
    Ok(parse_address(address, network)?.script_pubkey())
}

/// Classify an address by the single-signer script it pays to.
///
/// P2SH is assumed to wrap P2WPKH. Script types a single key cannot spend
/// (P2WSH, P2TR) yield `None`.
pub fn address_type_of(address: &str, network: BtcNetwork) -> Result<Option<AddressType>, UtxoError> {
    let parsed = parse_address(address, network)?;
    Ok(match parsed.address_type() {
        Some(bitcoin::AddressType::P2pkh) => Some(AddressType::P2pkh),
        Some(bitcoin::AddressType::P2sh) => Some(AddressType::P2shP2wpkh),
        Some(bitcoin::AddressType::P2wpkh) => Some(AddressType::P2wpkh),
        _ => None,
    })
}
