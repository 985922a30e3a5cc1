//! HD-wallet payments for UTXO chains.
//!
//! Derives account addresses from an extended key, resolves fee requests,
//! and drives the coin-selection builder from `chain-utxo` against a
//! Blockbook indexer through `utxo-api`.

pub mod address_cache;
pub mod config;
pub mod error;
pub mod fees;
pub mod hd_derivation;
pub mod mnemonic;
pub mod payments;
pub mod types;

pub use address_cache::{AddressCache, HdAccount};
pub use config::PaymentsConfig;
pub use error::WalletError;
pub use fees::{BlockbookFeeRecommender, FeeRateRecommender, StaticFeeRecommender};
pub use payments::UtxoPayments;
pub use types::{
    BalanceResult, BroadcastResult, CreateTransactionOptions, FeeOption, Payport, PayportTarget,
    SignedTx, TransactionStatus, UnsignedTx,
};

pub use chain_utxo::address::AddressType;
pub use chain_utxo::network::{BtcNetwork, ChainPolicy};
pub use chain_utxo::types::{FeeLevel, FeeRate, FeeRateType, PaymentTx, TxOutput, UtxoInfo};
