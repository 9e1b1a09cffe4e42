//! Error types for the mock wallet

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Insufficient balance. Required: {required} ETH, Available: {available} ETH")]
    InsufficientBalance { required: String, available: String },

    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Quote failed: {0}")]
    QuoteFailed(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error(
        "Price changed by {change_percent:.2}% (max {max_percent:.2}%). Transaction rejected for your protection."
    )]
    PriceSlippage { change_percent: f64, max_percent: f64 },

    #[error("Transaction approval window expired")]
    Expired,

    #[error("A transaction is already awaiting approval")]
    TransactionPending,

    #[error("No transaction is awaiting approval")]
    NoPendingTransaction,

    #[error("No wallet connected")]
    NotConnected,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
