//! Derived-address cache shared by accounts built from the same key.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chain_utxo::address::AddressType;
use chain_utxo::network::BtcNetwork;
use tracing::debug;

use crate::error::WalletError;
use crate::hd_derivation::{self, HdNode};

/// `(account key, index) -> address` memo.
///
/// Entries are never evicted; inserting an existing key with the same
/// value is a no-op, so concurrent writers cannot disagree.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: RwLock<HashMap<(String, u32), String>>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, xpub: &str, index: u32) -> Option<String> {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&(xpub.to_string(), index)).cloned()
    }

    pub fn insert(&self, xpub: &str, index: u32, address: &str) {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        map.entry((xpub.to_string(), index))
            .or_insert_with(|| address.to_string());
    }

    /// Cached index for `address` under `xpub`, if it has been derived.
    pub fn find_index(&self, xpub: &str, address: &str) -> Option<u32> {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        map.iter()
            .find(|((key, _), cached)| key == xpub && cached.as_str() == address)
            .map(|((_, index), _)| *index)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An account node plus everything needed to render its addresses.
#[derive(Debug, Clone)]
pub struct HdAccount {
    node: HdNode,
    xpub: String,
    address_type: AddressType,
    network: BtcNetwork,
    cache: Arc<AddressCache>,
}

impl HdAccount {
    /// Derive the account at `path` from `root_key`.
    pub fn new(
        root_key: &str,
        path: &str,
        address_type: AddressType,
        network: BtcNetwork,
        cache: Arc<AddressCache>,
    ) -> Result<Self, WalletError> {
        let node = hd_derivation::derive_node(root_key, path)?;
        // Testnet, signet and regtest share SLIP-132 prefixes but not address HRPs.
        let xpub = format!("{network}:{}", node.to_xpub(address_type.xpub_prefix(network))?);
        Ok(Self {
            node,
            xpub,
            address_type,
            network,
            cache,
        })
    }

    pub fn node(&self) -> &HdNode {
        &self.node
    }

    /// Cache key: network plus the account xpub under its script-specific
    /// prefix, so accounts rendering different addresses never collide.
    pub fn cache_key(&self) -> &str {
        &self.xpub
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    pub fn get_address(&self, index: u32) -> Result<String, WalletError> {
        if let Some(address) = self.cache.get(&self.xpub, index) {
            return Ok(address);
        }
        let address =
            hd_derivation::get_address(&self.node, index, self.address_type, self.network)?;
        self.cache.insert(&self.xpub, index, &address);
        Ok(address)
    }

    /// Reverse lookup by deriving indices `0..max_scan`.
    pub fn lookup_index(&self, address: &str, max_scan: u32) -> Result<Option<u32>, WalletError> {
        if let Some(index) = self.cache.find_index(&self.xpub, address) {
            return Ok(Some(index));
        }
        for index in 0..max_scan {
            if self.get_address(index)? == address {
                return Ok(Some(index));
            }
        }
        debug!(address, max_scan, "address not found in account scan");
        Ok(None)
    }
}
