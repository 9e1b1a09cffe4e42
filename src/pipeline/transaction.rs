//! Transaction artifacts
//!
//! A transfer moves through two value types. `PendingTransaction` is the
//! unsigned artifact produced by preparation; signing consumes it and yields
//! a `SignedTransaction`, which execution consumes in turn. Once executed or
//! dropped, a transaction cannot be replayed through the same value.

use crate::amount::Amount;
use crate::keyring::Keyring;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unit the user denominated a transfer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// The native asset
    Eth,
    /// Fiat, converted through the price oracle
    Usd,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Eth => write!(f, "ETH"),
            Currency::Usd => write!(f, "USD"),
        }
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" => Ok(Currency::Eth),
            "USD" => Ok(Currency::Usd),
            _ => Err(Error::UnsupportedCurrency(s.to_string())),
        }
    }
}

/// Human-readable statement the sender signs.
///
/// Amounts are rendered from exact wei, so the same transfer always yields
/// byte-identical text.
pub fn canonical_message(from: &str, to: &str, amount: Amount, fiat_amount: Option<f64>) -> String {
    match fiat_amount {
        Some(fiat) => format!(
            "Transfer {} ETH (${:.2} USD) to {} from {}",
            amount.format_fixed6(),
            fiat,
            to,
            from
        ),
        None => format!("Transfer {} ETH to {} from {}", amount.format_fixed6(), to, from),
    }
}

/// A prepared, unsigned transfer awaiting approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: Uuid,
    /// Checksummed sender
    pub from: String,
    /// Checksummed recipient
    pub to: String,
    /// Native amount to move
    pub amount: Amount,
    /// Fiat amount the transfer was requested in, if any
    pub fiat_amount: Option<f64>,
    /// Fiat per native rate the conversion used
    pub quoted_rate: Option<f64>,
    /// Whether the conversion fell back to the fixed rate
    pub used_fallback_rate: bool,
    /// Canonical message to be signed
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl PendingTransaction {
    /// Whether `message` still matches the transfer fields.
    pub fn is_consistent(&self) -> bool {
        self.message == canonical_message(&self.from, &self.to, self.amount, self.fiat_amount)
    }

    /// Sign the canonical message with the sender's phrase.
    pub fn sign(self, mnemonic: &SecretString) -> Result<SignedTransaction> {
        let signature = Keyring::sign(mnemonic, &self.message)?;
        Ok(self.with_signature(signature))
    }

    /// Attach a signature produced elsewhere.
    pub fn with_signature(self, signature: Vec<u8>) -> SignedTransaction {
        SignedTransaction {
            pending: self,
            signature,
        }
    }
}

/// A pending transfer plus the sender's 65-byte signature
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub pending: PendingTransaction,
    pub signature: Vec<u8>,
}
