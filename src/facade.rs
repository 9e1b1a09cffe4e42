//! Wallet facade
//!
//! The API the CLI (or any other front end) talks to. It composes the key
//! ring, ledger, oracle and pipeline and owns no state of its own beyond
//! configuration; interactive state lives in a caller-held `Session`.

use crate::amount::Amount;
use crate::audit::AuditLog;
use crate::config::{Config, WalletConfig};
use crate::keyring::Keyring;
use crate::ledger::{Ledger, TransactionRecord};
use crate::notify::{LogNotifier, Notifier, ResendNotifier};
use crate::oracle::{PriceOracle, RateReading};
use crate::pipeline::{Currency, PendingTransaction, SignedTransaction, TransactionPipeline};
use crate::session::Session;
use crate::{Error, Result};
use chrono::Utc;
use rand::Rng;
use secrecy::SecretString;
use std::sync::Arc;

/// A freshly generated wallet
#[derive(Debug)]
pub struct CreatedWallet {
    pub address: String,
    /// Shown to the user once; never persisted
    pub mnemonic: SecretString,
    pub balance: Amount,
}

pub struct WalletFacade {
    ledger: Ledger,
    oracle: Arc<PriceOracle>,
    pipeline: TransactionPipeline,
    wallet: WalletConfig,
    history_limit: usize,
}

impl WalletFacade {
    pub fn new(
        ledger: Ledger,
        oracle: Arc<PriceOracle>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let mut pipeline = TransactionPipeline::new(ledger.clone(), Arc::clone(&oracle), notifier)
            .with_transfer_config(&config.transfer);
        if let Some(path) = &config.audit_log_path {
            pipeline = pipeline.with_audit_log(AuditLog::new(path.clone()));
        }
        Self {
            ledger,
            oracle,
            pipeline,
            wallet: config.wallet.clone(),
            history_limit: config.transfer.history_limit,
        }
    }

    /// Open the on-disk ledger and HTTP providers described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let ledger = Ledger::open(&config.storage.path)?;
        let oracle = Arc::new(PriceOracle::from_config(config)?);
        let notifier: Arc<dyn Notifier> = if config.notifications.email {
            Arc::new(ResendNotifier::from_env()?)
        } else {
            Arc::new(LogNotifier)
        };
        Ok(Self::new(ledger, oracle, notifier, config))
    }

    pub fn pipeline(&self) -> &TransactionPipeline {
        &self.pipeline
    }

    // -- Wallets --------------------------------------------------------------

    /// Generate a new phrase and seed its wallet with a random balance.
    pub fn create_wallet(&self) -> Result<CreatedWallet> {
        let mnemonic = Keyring::generate_mnemonic()?;
        let address = Keyring::derive_address(&mnemonic)?;
        let balance = self.starting_balance()?;
        self.ledger.create_wallet(&address, balance)?;

        tracing::info!(address = %address, balance = %balance, "Wallet created");
        Ok(CreatedWallet {
            address,
            mnemonic,
            balance,
        })
    }

    /// Derive the wallet for an existing phrase, seeding it on first use.
    pub fn import_wallet(&self, mnemonic: &SecretString) -> Result<String> {
        let address = Keyring::derive_address(mnemonic)?;
        let created = self
            .ledger
            .create_wallet_if_absent(&address, self.starting_balance()?)?;

        tracing::info!(address = %address, created, "Wallet imported");
        Ok(address)
    }

    pub fn get_balance(&self, address: &str) -> Result<Amount> {
        self.ledger.get_balance(address)
    }

    pub async fn current_rate(&self) -> RateReading {
        self.oracle.current_rate().await
    }

    pub fn history(&self, address: &str) -> Result<Vec<TransactionRecord>> {
        self.ledger.history(address, self.history_limit)
    }

    pub fn history_with_limit(&self, address: &str, limit: usize) -> Result<Vec<TransactionRecord>> {
        self.ledger.history(address, limit)
    }

    // -- Transfers ------------------------------------------------------------

    pub async fn prepare(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        currency: Currency,
    ) -> Result<PendingTransaction> {
        self.pipeline.prepare(from, to, amount, currency).await
    }

    pub async fn execute(&self, signed: SignedTransaction) -> Result<TransactionRecord> {
        self.pipeline.execute(signed).await
    }

    // -- Session helpers ------------------------------------------------------

    /// Import `mnemonic` and attach it to `session`.
    pub fn connect(&self, session: &mut Session, mnemonic: SecretString) -> Result<String> {
        let address = self.import_wallet(&mnemonic)?;
        session.connect(address.clone(), mnemonic);
        Ok(address)
    }

    /// Prepare a transfer from the connected wallet and hold it for approval.
    pub async fn prepare_in_session(
        &self,
        session: &mut Session,
        to: &str,
        amount: f64,
        currency: Currency,
    ) -> Result<PendingTransaction> {
        if let Some(expired) = session.clear_expired(&self.pipeline.window(), Utc::now()) {
            tracing::info!(id = %expired.id, "Discarded expired transaction");
        }
        if session.pending().is_some() {
            return Err(Error::TransactionPending);
        }

        let from = session.address()?.to_string();
        let pending = self.pipeline.prepare(&from, to, amount, currency).await?;
        session.set_pending(pending.clone())?;
        Ok(pending)
    }

    /// Seconds left to approve the session's pending transfer.
    pub fn remaining_seconds(&self, session: &Session) -> Result<u64> {
        let pending = session.pending().ok_or(Error::NoPendingTransaction)?;
        Ok(self.pipeline.remaining_seconds(pending, Utc::now()))
    }

    /// Sign the pending transfer with the session wallet and execute it.
    pub async fn approve(&self, session: &mut Session) -> Result<TransactionRecord> {
        let (pending, mnemonic) = session.take_for_approval()?;
        let signed = pending.sign(mnemonic)?;
        self.pipeline.execute(signed).await
    }

    pub async fn reject(&self, session: &mut Session) -> Result<PendingTransaction> {
        let pending = session.reject()?;
        self.pipeline.reject(pending.clone()).await;
        Ok(pending)
    }

    fn starting_balance(&self) -> Result<Amount> {
        let (min, max) = (self.wallet.initial_balance_min, self.wallet.initial_balance_max);
        if !(min.is_finite() && max.is_finite() && min >= 0.0 && min < max) {
            return Err(Error::Config(format!(
                "invalid initial balance range [{}, {})",
                min, max
            )));
        }
        Amount::from_ether_f64(rand::thread_rng().gen_range(min..max))
    }
}
