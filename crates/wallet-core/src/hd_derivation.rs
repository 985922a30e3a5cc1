use std::str::FromStr;

use bip32::{ChildNumber, DerivationPath, Prefix, XPrv, XPub};
use chain_utxo::address::{self, AddressType};
use chain_utxo::network::BtcNetwork;
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Serialized extended key length (version + depth + fingerprint + child + chain code + key).
const EXTENDED_KEY_LEN: usize = 78;

/// Offset of the key material; private keys start with a zero byte.
const KEY_DATA_OFFSET: usize = 45;

/// SLIP-132 version bytes for the prefixes we read and emit.
const VERSIONS: &[(&str, u32)] = &[
    ("xpub", 0x0488_b21e),
    ("xprv", 0x0488_ade4),
    ("ypub", 0x049d_7cb2),
    ("yprv", 0x049d_7878),
    ("zpub", 0x04b2_4746),
    ("zprv", 0x04b2_430c),
    ("tpub", 0x0435_87cf),
    ("tprv", 0x0435_8394),
    ("upub", 0x044a_5262),
    ("uprv", 0x044a_4e28),
    ("vpub", 0x045f_1cf6),
    ("vprv", 0x045f_18bc),
];

fn version_for(prefix: &str) -> Result<u32, WalletError> {
    VERSIONS
        .iter()
        .find(|(name, _)| *name == prefix)
        .map(|(_, v)| *v)
        .ok_or_else(|| WalletError::InvalidKeyMaterial(format!("unknown extended key prefix {prefix}")))
}

fn prefix_for(version: u32) -> Option<&'static str> {
    VERSIONS.iter().find(|(_, v)| *v == version).map(|(name, _)| *name)
}

fn decode_extended_key(key: &str) -> Result<Vec<u8>, WalletError> {
    let data = bs58::decode(key.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| WalletError::InvalidKeyMaterial(format!("invalid base58 extended key: {e}")))?;
    if data.len() != EXTENDED_KEY_LEN {
        return Err(WalletError::InvalidKeyMaterial(format!(
            "extended key must be {EXTENDED_KEY_LEN} bytes, got {}",
            data.len()
        )));
    }
    Ok(data)
}

/// Re-encode an extended key under a different version prefix.
///
/// Only the version bytes change, so a private key can only be given a
/// private prefix and vice versa.
pub fn convert_extended_key(key: &str, target_prefix: &str) -> Result<String, WalletError> {
    let mut data = Zeroizing::new(decode_extended_key(key)?);
    let is_private = data[KEY_DATA_OFFSET] == 0;
    if is_private != target_prefix.ends_with("prv") {
        return Err(WalletError::InvalidKeyMaterial(format!(
            "cannot re-encode a {} key with prefix {target_prefix}",
            if is_private { "private" } else { "public" }
        )));
    }
    data[..4].copy_from_slice(&version_for(target_prefix)?.to_be_bytes());
    Ok(bs58::encode(data.as_slice()).with_check().into_string())
}

/// An HD node, with or without private key material.
#[derive(Clone)]
pub enum HdNode {
    Private(XPrv),
    Public(XPub),
}

impl std::fmt::Debug for HdNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HdNode::Private(_) => write!(f, "HdNode::Private(depth={})", self.depth()),
            HdNode::Public(_) => write!(f, "HdNode::Public(depth={})", self.depth()),
        }
    }
}

impl HdNode {
    /// Parse an extended key carrying any known or chain-specific prefix.
    pub fn from_extended_key(key: &str) -> Result<Self, WalletError> {
        let data = Zeroizing::new(decode_extended_key(key)?);
        if data[KEY_DATA_OFFSET] == 0 {
            let standard = Zeroizing::new(convert_extended_key(key, "xprv")?);
            Ok(HdNode::Private(XPrv::from_str(&standard)?))
        } else {
            let standard = convert_extended_key(key, "xpub")?;
            Ok(HdNode::Public(XPub::from_str(&standard)?))
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            HdNode::Private(xprv) => xprv.attrs().depth,
            HdNode::Public(xpub) => xpub.attrs().depth,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, HdNode::Private(_))
    }

    pub fn public_key(&self) -> XPub {
        match self {
            HdNode::Private(xprv) => xprv.public_key(),
            HdNode::Public(xpub) => xpub.clone(),
        }
    }

    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        match self {
            HdNode::Private(xprv) => Ok(HdNode::Private(xprv.derive_child(child)?)),
            HdNode::Public(xpub) => {
                if child.is_hardened() {
                    return Err(WalletError::InvalidKeyMaterial(format!(
                        "cannot derive hardened child {} from a public key",
                        child.index()
                    )));
                }
                Ok(HdNode::Public(xpub.derive_child(child)?))
            }
        }
    }

    /// Extended public key encoded with `prefix` (e.g. `zpub`).
    pub fn to_xpub(&self, prefix: &str) -> Result<String, WalletError> {
        convert_extended_key(&self.public_key().to_string(Prefix::XPUB), prefix)
    }

    /// Extended private key encoded with `prefix`, if this node has one.
    pub fn to_xprv(&self, prefix: &str) -> Result<Option<Zeroizing<String>>, WalletError> {
        match self {
            HdNode::Private(xprv) => {
                let standard = xprv.to_string(Prefix::XPRV);
                Ok(Some(Zeroizing::new(convert_extended_key(&standard, prefix)?)))
            }
            HdNode::Public(_) => Ok(None),
        }
    }

    fn address_child(&self, index: u32) -> Result<Self, WalletError> {
        self.derive_child(ChildNumber::new(0, false)?)?
            .derive_child(ChildNumber::new(index, false)?)
    }
}

/// Default account path: m/purpose'/coin_type'/account'
pub fn default_account_path(address_type: AddressType, coin_type: u32, account: u32) -> String {
    format!("m/{}'/{}'/{}'", address_type.purpose(), coin_type, account)
}

/// Derive the node at `path`, applying only the components below the
/// root key's own depth.
///
/// A key already derived to `m/84'/0'/0'` can be handed the full account
/// path and is returned unchanged.
pub fn derive_node(root_key: &str, path: &str) -> Result<HdNode, WalletError> {
    let path = DerivationPath::from_str(path)
        .map_err(|e| WalletError::InvalidKeyMaterial(format!("invalid derivation path {path}: {e}")))?;
    let root = HdNode::from_extended_key(root_key)?;
    let depth = usize::from(root.depth());

    let node = path
        .iter()
        .skip(depth)
        .try_fold(root, |node, child| node.derive_child(child))?;
    Ok(node)
}

/// Address at external-chain `index` below an account node.
pub fn get_address(
    node: &HdNode,
    index: u32,
    address_type: AddressType,
    network: BtcNetwork,
) -> Result<String, WalletError> {
    let child = node.address_child(index)?;
    let pubkey = child.public_key().to_bytes();
    Ok(address::pubkey_to_address(&pubkey, address_type, network)?)
}

/// WIF private key at external-chain `index`, or `None` for public nodes.
pub fn get_private_key(
    node: &HdNode,
    index: u32,
    network: BtcNetwork,
) -> Result<Option<Zeroizing<String>>, WalletError> {
    if !node.is_private() {
        return Ok(None);
    }
    let key = derive_secp256k1_key(node, index)?;
    let private_key = bitcoin::PrivateKey::from_slice(&key.private_key, network.to_bitcoin_network())
        .map_err(|e| WalletError::InvalidKeyMaterial(e.to_string()))?;
    Ok(Some(Zeroizing::new(private_key.to_wif())))
}

/// Raw key pair at external-chain `index`; fails on public-only nodes.
pub fn derive_secp256k1_key(node: &HdNode, index: u32) -> Result<DerivedKey, WalletError> {
    let HdNode::Private(xprv) = node.address_child(index)? else {
        return Err(WalletError::InvalidKeyMaterial(
            "private key requested from a public-only node".into(),
        ));
    };

    Ok(DerivedKey {
        private_key: xprv.to_bytes(),
        public_key_compressed: xprv.public_key().to_bytes(),
        index,
    })
}

/// Convert an extended private key to its extended public key, keeping
/// the script-type family of the prefix (`zprv` -> `zpub`).
pub fn xprv_to_xpub(xprv: &str) -> Result<String, WalletError> {
    let data = Zeroizing::new(decode_extended_key(xprv)?);
    let version = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let node = HdNode::from_extended_key(xprv)?;
    if !node.is_private() {
        return Err(WalletError::InvalidKeyMaterial("expected an extended private key".into()));
    }
    let pub_prefix = match prefix_for(version) {
        Some(prefix) => prefix.replace("prv", "pub"),
        None => "xpub".to_string(),
    };
    node.to_xpub(&pub_prefix)
}

/// Master extended private key for a BIP39 seed.
pub fn seed_to_xprv(seed: &[u8], network: BtcNetwork) -> Result<Zeroizing<String>, WalletError> {
    let master = XPrv::new(seed)?;
    let standard = master.to_string(Prefix::XPRV);
    if network.is_mainnet() {
        Ok(standard)
    } else {
        Ok(Zeroizing::new(convert_extended_key(&standard, "tprv")?))
    }
}

/// Derived secp256k1 key pair, wiped on drop.
pub struct DerivedKey {
    pub private_key: [u8; 32],
    pub public_key_compressed: [u8; 33],
    pub index: u32,
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}
