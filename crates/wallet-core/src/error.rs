use chain_utxo::error::UtxoError;
use thiserror::Error;
use utxo_api::ApiError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid numeric input: {0}")]
    InvalidNumericInput(String),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Balance not sweepable: {0}")]
    BalanceNotSweepable(String),

    #[error("No utxos to sweep: {0}")]
    NoUtxosToSweep(String),

    #[error("Dust output: {0}")]
    DustOutput(String),

    #[error("Fee too high: {0}")]
    FeeTooHigh(String),

    #[error("Transaction build failed: {0}")]
    TransactionFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UtxoError> for WalletError {
    fn from(e: UtxoError) -> Self {
        match e {
            UtxoError::InvalidNumericInput(m) => WalletError::InvalidNumericInput(m),
            UtxoError::InvalidAmount(m) => WalletError::InvalidAmount(m),
            UtxoError::InvalidAddress(m) => WalletError::InvalidAddress(m),
            UtxoError::InvalidPublicKey(m) | UtxoError::InvalidPrivateKey(m) => {
                WalletError::InvalidKeyMaterial(m)
            }
            UtxoError::InsufficientFunds(m) => WalletError::InsufficientFunds(m),
            UtxoError::DustOutput(m) => WalletError::DustOutput(m),
            UtxoError::FeeTooHigh(m) => WalletError::FeeTooHigh(m),
            UtxoError::TransactionBuildError(m) => WalletError::TransactionFailed(m),
            UtxoError::SigningError(m) => WalletError::SigningFailed(m),
        }
    }
}

impl From<bip32::Error> for WalletError {
    fn from(e: bip32::Error) -> Self {
        WalletError::InvalidKeyMaterial(e.to_string())
    }
}
