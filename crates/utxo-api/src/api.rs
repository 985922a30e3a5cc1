use async_trait::async_trait;
use chain_utxo::types::UtxoInfo;

use crate::error::ApiError;
use crate::types::{AddressDetails, BlockInfo, BlockbookTx};

/// Indexer calls the payments engine depends on.
#[async_trait]
pub trait UtxoApi: Send + Sync {
    /// Unspent outputs of `address`, including unconfirmed ones.
    async fn get_utxos_for_address(&self, address: &str) -> Result<Vec<UtxoInfo>, ApiError>;

    async fn get_address_details(&self, address: &str) -> Result<AddressDetails, ApiError>;

    async fn get_tx(&self, txid: &str) -> Result<BlockbookTx, ApiError>;

    /// Broadcast a raw transaction, returning the id the network assigned.
    async fn send_tx(&self, tx_hex: &str) -> Result<String, ApiError>;

    async fn get_block(&self, hash_or_height: &str) -> Result<BlockInfo, ApiError>;

    /// Fee estimate in main units per kilobyte for confirmation within `blocks`.
    async fn estimate_fee(&self, blocks: u32) -> Result<String, ApiError>;
}
