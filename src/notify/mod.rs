//! Transfer notifications
//!
//! Notifiers are fire-and-forget: the pipeline dispatches them on a spawned
//! task after a transfer commits, and their errors are only logged.

mod resend;

pub use resend::ResendNotifier;

use crate::amount::Amount;
use crate::ledger::TransactionRecord;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Subject line of completed-transfer emails
pub const TRANSFER_SUBJECT: &str = "Transaction Completed - Mock Web3 Wallet";

/// Subject line of test emails
pub const TEST_SUBJECT: &str = "Test Notification - Mock Web3 Wallet";

/// A committed transfer, as seen by notifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferEvent {
    pub record_id: u64,
    pub from: String,
    pub to: String,
    pub amount: Amount,
    pub fiat_amount: Option<f64>,
}

impl From<&TransactionRecord> for TransferEvent {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            record_id: record.id,
            from: record.from.clone(),
            to: record.to.clone(),
            amount: record.amount,
            fiat_amount: record.fiat_amount,
        }
    }
}

impl TransferEvent {
    /// `x.xxxxxx ETH`, plus `($y.yy USD)` for fiat transfers
    pub fn amount_text(&self) -> String {
        match self.fiat_amount {
            Some(fiat) => format!("{} ETH (${:.2} USD)", self.amount.format_fixed6(), fiat),
            None => format!("{} ETH", self.amount.format_fixed6()),
        }
    }

    pub fn text_body(&self) -> String {
        format!(
            "Transaction Successful!\n\n\
             Amount: {}\n\
             From: {}\n\
             To: {}\n\
             Status: Confirmed\n\n\
             This is a notification from your Mock Web3 Wallet.",
            self.amount_text(),
            self.from,
            self.to
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            r#"<html>
  <body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <div style="background-color: #f8f9fa; padding: 20px; border-radius: 10px;">
      <h2 style="color: #28a745;">Transaction Successful</h2>
      <div style="background-color: white; padding: 20px; border-radius: 5px; margin: 20px 0;">
        <h3>Transaction Details:</h3>
        <p><strong>Amount:</strong> {amount}</p>
        <p><strong>From:</strong> {from}</p>
        <p><strong>To:</strong> {to}</p>
        <p><strong>Status:</strong> <span style="color: #28a745;">Confirmed</span></p>
      </div>
      <p style="color: #6c757d; font-size: 14px;">
        This is a notification from your Mock Web3 Wallet.
        If you did not initiate this transaction, please secure your wallet immediately.
      </p>
    </div>
  </body>
</html>"#,
            amount = self.amount_text(),
            from = self.from,
            to = self.to
        )
    }
}

/// Sink for completed transfers
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn transaction_completed(&self, event: &TransferEvent) -> Result<()>;
}

/// Writes completed transfers to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn transaction_completed(&self, event: &TransferEvent) -> Result<()> {
        tracing::info!(
            record_id = event.record_id,
            from = %event.from,
            to = %event.to,
            amount = %event.amount_text(),
            "Transaction completed"
        );
        Ok(())
    }
}
