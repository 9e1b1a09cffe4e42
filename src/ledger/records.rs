//! Persisted ledger records

use crate::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wallet and its mock balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Checksummed address
    pub address: String,
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn new(address: String, balance: Amount) -> Self {
        Self {
            address,
            balance,
            created_at: Utc::now(),
        }
    }
}

/// A committed transfer
///
/// Records are append-only. `from`/`to` reference wallets informationally;
/// nothing enforces that the wallets still match the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Monotonic insertion id
    pub id: u64,
    pub from: String,
    pub to: String,
    pub amount: Amount,
    /// Fiat amount the sender asked for, when the transfer was priced in fiat
    pub fiat_amount: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether `address` sent or received this transfer
    pub fn involves(&self, address: &str) -> bool {
        self.from.eq_ignore_ascii_case(address) || self.to.eq_ignore_ascii_case(address)
    }
}
