//! Mock Web3 Wallet
//!
//! A local wallet emulator that:
//! - Derives accounts from BIP39 phrases and signs EIP-191 messages
//! - Keeps mock balances and an append-only transfer log in sled
//! - Converts fiat-denominated transfers through a price oracle
//! - Executes signed transfers with expiry and slippage checks
//!
//! # Security Model
//!
//! - Mnemonics are only ever held as `SecretString` and never persisted
//! - Private keys never leave the `keyring` module
//! - Every transfer is re-verified at execution time against its signature
//! - Balance moves and their records commit in one storage transaction

pub mod address;
pub mod amount;
pub mod audit;
pub mod config;
pub mod facade;
pub mod keyring;
pub mod ledger;
pub mod notify;
pub mod oracle;
pub mod pipeline;
pub mod session;

mod error;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use amount::Amount;
pub use config::Config;
pub use error::{Error, Result};
pub use facade::{CreatedWallet, WalletFacade};
pub use keyring::Keyring;
pub use ledger::{Ledger, TransactionRecord, WalletRecord};
pub use pipeline::{Currency, PendingTransaction, SignedTransaction, TransactionPipeline};
pub use session::Session;
