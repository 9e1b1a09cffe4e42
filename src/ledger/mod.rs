//! Ledger storage
//!
//! Durable balances and an append-only transfer log, built on sled.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                   | Value                     |
//! |----------------|-----------------------|---------------------------|
//! | `wallets`      | checksummed address   | `json(WalletRecord)`      |
//! | `transactions` | `id` (8B BE)          | `json(TransactionRecord)` |
//!
//! Transaction ids come from sled's monotonic id generator and are stored
//! big-endian, so iterating the tree backwards yields newest first.
//!
//! ## Atomicity
//!
//! Balance checks, debits, credits and the log append run inside one sled
//! transaction spanning both trees. sled transactions are serializable: two
//! transfers touching the same wallet conflict and one of them re-runs
//! against the committed state, while transfers on disjoint wallets proceed
//! independently. An aborted transaction leaves no trace.

mod records;

pub use records::{TransactionRecord, WalletRecord};

use crate::address;
use crate::amount::Amount;
use crate::{Error, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::path::Path;

/// Default page size for history queries
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<Error>>;

/// Persistent wallet ledger
///
/// Cheap to clone; clones share the same database.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Db,
    /// Wallet records keyed by checksummed address
    wallets: Tree,
    /// Transfer log keyed by big-endian id
    transactions: Tree,
}

impl Ledger {
    /// Open or create a ledger at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory ledger removed on drop. Intended for tests.
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let wallets = db.open_tree("wallets")?;
        let transactions = db.open_tree("transactions")?;
        Ok(Self {
            db,
            wallets,
            transactions,
        })
    }

    // -- Wallets --------------------------------------------------------------

    pub fn get_wallet(&self, address: &str) -> Result<Option<WalletRecord>> {
        let key = address::normalize(address)?;
        self.wallets
            .get(key.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Balance of `address`, zero when the wallet does not exist.
    pub fn get_balance(&self, address: &str) -> Result<Amount> {
        Ok(self
            .get_wallet(address)?
            .map(|wallet| wallet.balance)
            .unwrap_or(Amount::ZERO))
    }

    /// Insert or overwrite a wallet's balance.
    ///
    /// The creation timestamp of an existing wallet is preserved.
    pub fn create_wallet(&self, address: &str, initial_balance: Amount) -> Result<WalletRecord> {
        let key = address::normalize(address)?;
        let record = run(self.wallets.transaction(|wallets| {
            let record = match read_wallet(wallets, &key)? {
                Some(existing) => WalletRecord {
                    balance: initial_balance,
                    ..existing
                },
                None => WalletRecord::new(key.clone(), initial_balance),
            };
            write_wallet(wallets, &record)?;
            Ok(record)
        }))?;

        tracing::info!(address = %record.address, balance = %record.balance, "Wallet stored");
        Ok(record)
    }

    /// Create the wallet only if it does not exist yet.
    ///
    /// Returns `true` when a new wallet was created.
    pub fn create_wallet_if_absent(&self, address: &str, initial_balance: Amount) -> Result<bool> {
        let key = address::normalize(address)?;
        let created = run(self.wallets.transaction(|wallets| {
            if read_wallet(wallets, &key)?.is_some() {
                return Ok(false);
            }
            write_wallet(wallets, &WalletRecord::new(key.clone(), initial_balance))?;
            Ok(true)
        }))?;

        if created {
            tracing::info!(address = %key, balance = %initial_balance, "Wallet created");
        }
        Ok(created)
    }

    // -- Transfers ------------------------------------------------------------

    /// Move `amount` from `from` to `to` atomically.
    pub fn transfer(&self, from: &str, to: &str, amount: Amount) -> Result<()> {
        let (from, to) = transfer_keys(from, to, amount)?;
        run(self
            .wallets
            .transaction(|wallets| apply_transfer(wallets, &from, &to, amount)))?;
        tracing::info!(from = %from, to = %to, amount = %amount, "Balance transferred");
        Ok(())
    }

    /// Append a transfer to the log.
    pub fn record_transaction(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
        fiat_amount: Option<f64>,
    ) -> Result<TransactionRecord> {
        let (from, to) = (address::normalize(from)?, address::normalize(to)?);
        let record = run(self
            .transactions
            .transaction(|log| append_record(log, &from, &to, amount, fiat_amount)))?;
        self.db.flush()?;
        Ok(record)
    }

    /// Transfer and log in one storage transaction.
    ///
    /// Either both the balance move and its record are committed, or neither.
    pub fn commit_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
        fiat_amount: Option<f64>,
    ) -> Result<TransactionRecord> {
        let (from, to) = transfer_keys(from, to, amount)?;
        let record = run((&self.wallets, &self.transactions).transaction(|(wallets, log)| {
            apply_transfer(wallets, &from, &to, amount)?;
            append_record(log, &from, &to, amount, fiat_amount)
        }))?;
        self.db.flush()?;

        tracing::info!(
            id = record.id,
            from = %record.from,
            to = %record.to,
            amount = %record.amount,
            fiat_amount = ?record.fiat_amount,
            "Transfer committed"
        );
        Ok(record)
    }

    // -- Queries --------------------------------------------------------------

    /// Transfers sent or received by `address`, newest first.
    pub fn history(&self, address: &str, limit: usize) -> Result<Vec<TransactionRecord>> {
        let key = address::normalize(address)?;
        let mut records = Vec::new();
        for entry in self.transactions.iter().rev() {
            if records.len() >= limit {
                break;
            }
            let (_, bytes) = entry?;
            let record: TransactionRecord = decode(&bytes)?;
            if record.involves(&key) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Sum of every wallet balance.
    pub fn total_balance(&self) -> Result<Amount> {
        let mut total = Amount::ZERO;
        for entry in self.wallets.iter() {
            let (_, bytes) = entry?;
            let wallet: WalletRecord = decode(&bytes)?;
            total = total
                .checked_add(wallet.balance)
                .ok_or_else(|| Error::Storage("balance total overflows".to_string()))?;
        }
        Ok(total)
    }

    /// Block until all pending writes reach disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn transfer_keys(from: &str, to: &str, amount: Amount) -> Result<(String, String)> {
    if amount.is_zero() {
        return Err(Error::InvalidAmount("transfer amount must be positive".to_string()));
    }
    Ok((address::normalize(from)?, address::normalize(to)?))
}

/// Map sled's transaction outcome onto crate errors, aborts verbatim.
fn run<T>(result: std::result::Result<T, TransactionError<Error>>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(Error::Storage(e.to_string())),
    }
}

fn abort<T>(err: Error) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

fn read_wallet(wallets: &TransactionalTree, key: &str) -> TxResult<Option<WalletRecord>> {
    match wallets.get(key.as_bytes())? {
        Some(bytes) => decode(&bytes).map(Some).or_else(abort),
        None => Ok(None),
    }
}

fn write_wallet(wallets: &TransactionalTree, record: &WalletRecord) -> TxResult<()> {
    let bytes = encode(record).or_else(abort)?;
    wallets.insert(record.address.as_bytes(), bytes)?;
    Ok(())
}

fn apply_transfer(wallets: &TransactionalTree, from: &str, to: &str, amount: Amount) -> TxResult<()> {
    let insufficient = |available: Amount| Error::InsufficientBalance {
        required: amount.to_string(),
        available: available.to_string(),
    };

    let Some(mut sender) = read_wallet(wallets, from)? else {
        return abort(insufficient(Amount::ZERO));
    };
    let Some(debited) = sender.balance.checked_sub(amount) else {
        return abort(insufficient(sender.balance));
    };

    // self-transfer: balance check only, net effect is zero
    if from == to {
        return Ok(());
    }

    let mut recipient = read_wallet(wallets, to)?
        .unwrap_or_else(|| WalletRecord::new(to.to_string(), Amount::ZERO));
    let Some(credited) = recipient.balance.checked_add(amount) else {
        return abort(Error::Storage(format!("balance of {} overflows", to)));
    };

    sender.balance = debited;
    recipient.balance = credited;
    write_wallet(wallets, &sender)?;
    write_wallet(wallets, &recipient)?;
    Ok(())
}

fn append_record(
    log: &TransactionalTree,
    from: &str,
    to: &str,
    amount: Amount,
    fiat_amount: Option<f64>,
) -> TxResult<TransactionRecord> {
    let record = TransactionRecord {
        id: log.generate_id()?,
        from: from.to_string(),
        to: to.to_string(),
        amount,
        fiat_amount,
        timestamp: Utc::now(),
    };
    let bytes = encode(&record).or_else(abort)?;
    log.insert(record.id.to_be_bytes().to_vec(), bytes)?;
    Ok(record)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Storage(format!("encode: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Storage(format!("decode: {}", e)))
}
