use thiserror::Error;

/// UTXO chain operation errors.
#[derive(Debug, Error)]
pub enum UtxoError {
    #[error("invalid numeric input: {0}")]
    InvalidNumericInput(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("dust output: {0}")]
    DustOutput(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("fee too high: {0}")]
    FeeTooHigh(String),
}
