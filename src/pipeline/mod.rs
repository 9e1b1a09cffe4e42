//! Transaction pipeline
//!
//! Prepares transfers, enforces the approval window and executes signed
//! transfers against the ledger.
//!
//! ## Lifecycle
//!
//! ```text
//! prepare() ──> PendingTransaction ──sign()──> SignedTransaction ──execute()──> TransactionRecord
//!                      │                                 │
//!                      └── reject() / expiry             └── Expired | InvalidSignature
//!                                                            | PriceSlippage | InsufficientBalance
//! ```
//!
//! Preparation never touches the ledger. Execution re-validates everything
//! that may have changed since preparation (the clock, the signature, the
//! exchange rate and the sender's balance) before committing the transfer
//! and its record in one storage transaction.

mod slippage;
mod transaction;
mod window;

pub use slippage::{SlippageGuard, DEFAULT_MAX_SLIPPAGE_PERCENT};
pub use transaction::{canonical_message, Currency, PendingTransaction, SignedTransaction};
pub use window::{ApprovalWindow, DEFAULT_APPROVAL_WINDOW_SECS};

use crate::address;
use crate::amount::Amount;
use crate::audit::AuditLog;
use crate::config::TransferConfig;
use crate::keyring::Keyring;
use crate::ledger::{Ledger, TransactionRecord};
use crate::notify::{Notifier, TransferEvent};
use crate::oracle::PriceOracle;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct TransactionPipeline {
    ledger: Ledger,
    oracle: Arc<PriceOracle>,
    notifier: Arc<dyn Notifier>,
    audit: Option<AuditLog>,
    window: ApprovalWindow,
    slippage: SlippageGuard,
}

impl TransactionPipeline {
    pub fn new(ledger: Ledger, oracle: Arc<PriceOracle>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            oracle,
            notifier,
            audit: None,
            window: ApprovalWindow::default(),
            slippage: SlippageGuard::default(),
        }
    }

    /// Apply the approval window and slippage tolerance from config.
    pub fn with_transfer_config(mut self, config: &TransferConfig) -> Self {
        self.window = ApprovalWindow::new(config.approval_window_secs);
        self.slippage = SlippageGuard::new(config.max_slippage_percent);
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn window(&self) -> ApprovalWindow {
        self.window
    }

    /// Build an unsigned transfer of `amount` units of `currency`.
    ///
    /// Validates addresses and the amount, converts fiat through the oracle
    /// and checks the sender can cover the native amount. The ledger is not
    /// modified.
    pub async fn prepare(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        currency: Currency,
    ) -> Result<PendingTransaction> {
        let from = address::normalize(from)?;
        let to = address::normalize(to)?;
        if !(amount.is_finite() && amount > 0.0) {
            return Err(Error::InvalidAmount(format!(
                "amount must be a positive number, got {}",
                amount
            )));
        }

        let balance = self.ledger.get_balance(&from)?;

        let (native, fiat_amount, quoted_rate, used_fallback_rate) = match currency {
            Currency::Eth => (Amount::from_ether_f64(amount)?, None, None, false),
            Currency::Usd => {
                let quote = self
                    .oracle
                    .quote(amount)
                    .await
                    .map_err(|e| Error::QuoteUnavailable(e.to_string()))?;
                (
                    quote.native_amount,
                    Some(amount),
                    Some(quote.rate),
                    quote.used_fallback,
                )
            }
        };

        if native.is_zero() {
            return Err(Error::InvalidAmount(format!(
                "{} {} is less than 1 wei",
                amount, currency
            )));
        }
        if native > balance {
            return Err(Error::InsufficientBalance {
                required: native.to_string(),
                available: balance.to_string(),
            });
        }

        let pending = PendingTransaction {
            id: Uuid::new_v4(),
            message: canonical_message(&from, &to, native, fiat_amount),
            from,
            to,
            amount: native,
            fiat_amount,
            quoted_rate,
            used_fallback_rate,
            created_at: Utc::now(),
        };

        tracing::info!(
            id = %pending.id,
            from = %pending.from,
            to = %pending.to,
            amount = %pending.amount,
            currency = %currency,
            used_fallback_rate = pending.used_fallback_rate,
            "Transaction prepared"
        );
        if let Some(audit) = &self.audit {
            audit.prepared(&pending).await;
        }
        Ok(pending)
    }

    /// Seconds left to approve `pending` at `now`.
    pub fn remaining_seconds(&self, pending: &PendingTransaction, now: DateTime<Utc>) -> u64 {
        self.window.remaining_seconds(pending.created_at, now)
    }

    pub fn is_expired(&self, pending: &PendingTransaction, now: DateTime<Utc>) -> bool {
        self.window.is_expired(pending.created_at, now)
    }

    /// Discard a pending transfer.
    pub async fn reject(&self, pending: PendingTransaction) {
        tracing::info!(id = %pending.id, "Transaction rejected");
        if let Some(audit) = &self.audit {
            audit.rejected(&pending).await;
        }
    }

    /// Execute a signed transfer now.
    pub async fn execute(&self, signed: SignedTransaction) -> Result<TransactionRecord> {
        self.execute_at(signed, Utc::now()).await
    }

    /// Execute a signed transfer as of `now`.
    pub async fn execute_at(
        &self,
        signed: SignedTransaction,
        now: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        match self.try_execute(&signed, now).await {
            Ok(record) => {
                if let Some(audit) = &self.audit {
                    audit.executed(&signed.pending, record.id).await;
                }
                self.dispatch_notification(&record);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(id = %signed.pending.id, error = %e, "Transaction failed");
                if let Some(audit) = &self.audit {
                    audit.failed(&signed.pending, &e).await;
                }
                Err(e)
            }
        }
    }

    async fn try_execute(
        &self,
        signed: &SignedTransaction,
        now: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        let tx = &signed.pending;

        if self.window.is_expired(tx.created_at, now) {
            return Err(Error::Expired);
        }

        if !tx.is_consistent() || !Keyring::verify(&tx.from, &tx.message, &signed.signature) {
            return Err(Error::InvalidSignature);
        }

        if let (Some(fiat_amount), Some(original_rate)) = (tx.fiat_amount, tx.quoted_rate) {
            let current = self
                .oracle
                .quote(fiat_amount)
                .await
                .map_err(|e| Error::QuoteUnavailable(e.to_string()))?;
            if current.used_fallback && !tx.used_fallback_rate {
                tracing::warn!(id = %tx.id, "Live rate unavailable at execution, comparing against fallback rate");
            }
            self.slippage.check(original_rate, current.rate)?;
        }

        let balance = self.ledger.get_balance(&tx.from)?;
        if tx.amount > balance {
            return Err(Error::InsufficientBalance {
                required: tx.amount.to_string(),
                available: balance.to_string(),
            });
        }

        let record = self
            .ledger
            .commit_transfer(&tx.from, &tx.to, tx.amount, tx.fiat_amount)?;

        tracing::info!(id = %tx.id, record_id = record.id, "Transaction executed");
        Ok(record)
    }

    fn dispatch_notification(&self, record: &TransactionRecord) {
        let notifier = Arc::clone(&self.notifier);
        let event = TransferEvent::from(record);
        tokio::spawn(async move {
            if let Err(e) = notifier.transaction_completed(&event).await {
                tracing::warn!(record_id = event.record_id, error = %e, "Notification failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit;
    use crate::test_support::{
        test_mnemonic, FailingSource, FixedQuotes, MutablePrice, RecordingNotifier, TEST_ADDRESS,
    };
    use chrono::Duration;

    const BOB: &str = "0x2222222222222222222222222222222222222222";

    fn eth(s: &str) -> Amount {
        Amount::parse_ether(s).unwrap()
    }

    struct Harness {
        ledger: Ledger,
        price: Arc<MutablePrice>,
        notifier: Arc<RecordingNotifier>,
        pipeline: TransactionPipeline,
    }

    fn harness(balance: &str) -> Harness {
        harness_with_fallback(balance, 3000.0)
    }

    fn harness_with_fallback(balance: &str, fallback_rate: f64) -> Harness {
        let ledger = Ledger::open_temporary().unwrap();
        ledger.create_wallet(TEST_ADDRESS, eth(balance)).unwrap();
        let price = Arc::new(MutablePrice::new(2500.0));
        let notifier = Arc::new(RecordingNotifier::default());
        let oracle = Arc::new(PriceOracle::new(price.clone(), fallback_rate));
        let pipeline = TransactionPipeline::new(ledger.clone(), oracle, notifier.clone());
        Harness {
            ledger,
            price,
            notifier,
            pipeline,
        }
    }

    #[tokio::test]
    async fn test_native_transfer_scenario() {
        let h = harness("5");

        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 2.0, Currency::Eth)
            .await
            .unwrap();
        assert_eq!(pending.amount, eth("2"));
        assert_eq!(
            pending.message,
            format!("Transfer 2.000000 ETH to {} from {}", BOB, TEST_ADDRESS)
        );
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));

        let signed = pending.sign(&test_mnemonic()).unwrap();
        let record = h.pipeline.execute(signed).await.unwrap();

        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("3"));
        assert_eq!(h.ledger.get_balance(BOB).unwrap(), eth("2"));

        let history = h.ledger.history(TEST_ADDRESS, 50).unwrap();
        assert_eq!(history, vec![record.clone()]);
        assert_eq!(record.from, TEST_ADDRESS);
        assert_eq!(record.to, BOB);
        assert_eq!(record.amount, eth("2"));
        assert_eq!(record.fiat_amount, None);
    }

    #[tokio::test]
    async fn test_fiat_transfer_blocked_by_slippage() {
        let h = harness("5");

        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 100.0, Currency::Usd)
            .await
            .unwrap();
        assert_eq!(pending.amount, eth("0.04"));
        assert_eq!(pending.fiat_amount, Some(100.0));
        assert_eq!(pending.quoted_rate, Some(2500.0));
        assert!(pending.message.starts_with("Transfer 0.040000 ETH ($100.00 USD) to "));

        h.price.set(2560.0);
        let signed = pending.sign(&test_mnemonic()).unwrap();
        let err = h.pipeline.execute(signed).await.unwrap_err();

        assert!(matches!(err, Error::PriceSlippage { .. }));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
        assert_eq!(h.ledger.get_balance(BOB).unwrap(), Amount::ZERO);
        assert!(h.ledger.history(TEST_ADDRESS, 50).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fiat_transfer_at_exact_tolerance_executes() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 100.0, Currency::Usd)
            .await
            .unwrap();

        h.price.set(2525.0);
        let record = h
            .pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();

        assert_eq!(record.amount, eth("0.04"));
        assert_eq!(record.fiat_amount, Some(100.0));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("4.96"));
    }

    #[tokio::test]
    async fn test_fallback_rate_is_flagged() {
        let ledger = Ledger::open_temporary().unwrap();
        ledger.create_wallet(TEST_ADDRESS, eth("5")).unwrap();
        let oracle = Arc::new(PriceOracle::new(Arc::new(FailingSource), 3000.0));
        let pipeline =
            TransactionPipeline::new(ledger, oracle, Arc::new(RecordingNotifier::default()));

        let pending = pipeline
            .prepare(TEST_ADDRESS, BOB, 300.0, Currency::Usd)
            .await
            .unwrap();
        assert!(pending.used_fallback_rate);
        assert_eq!(pending.quoted_rate, Some(3000.0));
        assert_eq!(pending.amount, eth("0.1"));
    }

    #[tokio::test]
    async fn test_quote_unavailable_at_prepare() {
        let ledger = Ledger::open_temporary().unwrap();
        ledger.create_wallet(TEST_ADDRESS, eth("5")).unwrap();
        let oracle = Arc::new(
            PriceOracle::new(Arc::new(FailingSource), 0.0)
                .with_quote_provider(Arc::new(FixedQuotes::failing())),
        );
        let pipeline = TransactionPipeline::new(
            ledger.clone(),
            oracle,
            Arc::new(RecordingNotifier::default()),
        );

        let err = pipeline
            .prepare(TEST_ADDRESS, BOB, 100.0, Currency::Usd)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::QuoteUnavailable(_)));
        assert_eq!(ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
        assert!(ledger.get_wallet(BOB).unwrap().is_none());

        // native transfers never consult the oracle
        pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_quote_unavailable_at_execute_leaves_balances() {
        let h = harness_with_fallback("5", 0.0);
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 100.0, Currency::Usd)
            .await
            .unwrap();

        // live price gone and the fallback cannot price either
        h.price.set(0.0);
        let err = h
            .pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::QuoteUnavailable(_)));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
        assert_eq!(h.ledger.get_balance(BOB).unwrap(), Amount::ZERO);
        assert!(h.ledger.history(TEST_ADDRESS, 50).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remaining_balance_can_be_sent_in_full() {
        let h = harness("5");

        for amount in [3.9, 1.1] {
            let pending = h
                .pipeline
                .prepare(TEST_ADDRESS, BOB, amount, Currency::Eth)
                .await
                .unwrap();
            h.pipeline
                .execute(pending.sign(&test_mnemonic()).unwrap())
                .await
                .unwrap();
        }

        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), Amount::ZERO);
        assert_eq!(h.ledger.get_balance(BOB).unwrap(), eth("5"));
    }

    #[tokio::test]
    async fn test_expired_transaction_fails_without_ledger_change() {
        let h = harness("5");
        let mut pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        pending.created_at -= Duration::seconds(31);

        let err = h
            .pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Expired));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
    }

    #[tokio::test]
    async fn test_window_boundary_still_executes() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        let at_boundary = pending.created_at + Duration::seconds(30);

        assert_eq!(h.pipeline.remaining_seconds(&pending, at_boundary), 0);
        h.pipeline
            .execute_at(pending.sign(&test_mnemonic()).unwrap(), at_boundary)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tampered_message_is_invalid_signature() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        let mut signed = pending.sign(&test_mnemonic()).unwrap();
        signed.pending.message = signed.pending.message.replace("1.000000", "4.000000");
        signed.pending.amount = eth("4");

        let err = h.pipeline.execute(signed).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
    }

    #[tokio::test]
    async fn test_redirected_recipient_is_invalid_signature() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        let mut signed = pending.sign(&test_mnemonic()).unwrap();
        signed.pending.to = "0x3333333333333333333333333333333333333333".to_string();

        let err = h.pipeline.execute(signed).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
    }

    #[tokio::test]
    async fn test_tampered_signature_is_invalid_signature() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();

        let mut signed = pending.clone().sign(&test_mnemonic()).unwrap();
        signed.signature[10] ^= 0xff;
        let err = h.pipeline.execute(signed).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));

        let truncated = pending.with_signature(vec![0u8; 12]);
        let err = h.pipeline.execute(truncated).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
    }

    #[tokio::test]
    async fn test_prepare_validation() {
        let h = harness("5");

        assert!(matches!(
            h.pipeline.prepare("0xnope", BOB, 1.0, Currency::Eth).await,
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            h.pipeline.prepare(TEST_ADDRESS, "bob", 1.0, Currency::Eth).await,
            Err(Error::InvalidAddress(_))
        ));
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                h.pipeline.prepare(TEST_ADDRESS, BOB, amount, Currency::Eth).await,
                Err(Error::InvalidAmount(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_insufficient_balance_fails_at_prepare() {
        let h = harness("1");
        let err = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 1.5, Currency::Eth)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));

        let err = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 5000.0, Currency::Usd)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn test_balance_rechecked_at_execute() {
        let h = harness("5");
        let first = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 3.0, Currency::Eth)
            .await
            .unwrap();
        let second = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 3.0, Currency::Eth)
            .await
            .unwrap();

        h.pipeline
            .execute(first.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();
        let err = h
            .pipeline
            .execute(second.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("2"));
    }

    #[tokio::test]
    async fn test_self_transfer_is_logged_and_conserves() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, TEST_ADDRESS, 1.0, Currency::Eth)
            .await
            .unwrap();
        h.pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();

        assert_eq!(h.ledger.get_balance(TEST_ADDRESS).unwrap(), eth("5"));
        assert_eq!(h.ledger.history(TEST_ADDRESS, 50).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_dispatched_after_commit() {
        let h = harness("5");
        let pending = h
            .pipeline
            .prepare(TEST_ADDRESS, BOB, 100.0, Currency::Usd)
            .await
            .unwrap();
        let record = h
            .pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();

        let events = h.notifier.wait_for(1).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record_id, record.id);
        assert_eq!(events[0].fiat_amount, Some(100.0));
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_fail_transfer() {
        let ledger = Ledger::open_temporary().unwrap();
        ledger.create_wallet(TEST_ADDRESS, eth("5")).unwrap();
        let oracle = Arc::new(PriceOracle::new(Arc::new(MutablePrice::new(2500.0)), 3000.0));
        let pipeline = TransactionPipeline::new(
            ledger.clone(),
            oracle,
            Arc::new(RecordingNotifier::failing()),
        );

        let pending = pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();
        assert_eq!(ledger.get_balance(BOB).unwrap(), eth("1"));
    }

    #[tokio::test]
    async fn test_audit_trail_records_outcomes() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let Harness {
            ledger, pipeline, ..
        } = harness("5");
        let pipeline = pipeline.with_audit_log(AuditLog::new(temp_file.path()));

        let ok = pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        pipeline
            .execute(ok.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();

        let dropped = pipeline
            .prepare(TEST_ADDRESS, BOB, 1.0, Currency::Eth)
            .await
            .unwrap();
        pipeline.reject(dropped).await;

        let entries = audit::read_entries(temp_file.path()).unwrap();
        let events: Vec<_> = entries.iter().map(|e| e["event"].as_str().unwrap()).collect();
        assert_eq!(events, vec!["prepared", "executed", "prepared", "rejected"]);
        assert_eq!(ledger.get_balance(TEST_ADDRESS).unwrap(), eth("4"));
    }

    #[tokio::test]
    async fn test_custom_transfer_config() {
        let config = TransferConfig {
            approval_window_secs: 5,
            max_slippage_percent: 5.0,
            ..TransferConfig::default()
        };
        let h = harness("5");
        let pipeline = h.pipeline.with_transfer_config(&config);
        assert_eq!(pipeline.window().seconds(), 5);

        let pending = pipeline
            .prepare(TEST_ADDRESS, BOB, 100.0, Currency::Usd)
            .await
            .unwrap();
        h.price.set(2560.0);
        pipeline
            .execute(pending.sign(&test_mnemonic()).unwrap())
            .await
            .unwrap();
    }
}
