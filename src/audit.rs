//! Transfer audit trail
//!
//! Appends one JSON object per line for every lifecycle step of a transfer.
//! Write failures are logged and never interrupt the transfer itself.

use crate::pipeline::PendingTransaction;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    event: &'static str,
    transaction_id: Uuid,
    from: &'a str,
    to: &'a str,
    amount: String,
    fiat_amount: Option<f64>,
    quoted_rate: Option<f64>,
    used_fallback_rate: bool,
    record_id: Option<u64>,
    error: Option<String>,
}

impl<'a> AuditEntry<'a> {
    fn for_transaction(event: &'static str, tx: &'a PendingTransaction) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            transaction_id: tx.id,
            from: &tx.from,
            to: &tx.to,
            amount: tx.amount.format_fixed6(),
            fiat_amount: tx.fiat_amount,
            quoted_rate: tx.quoted_rate,
            used_fallback_rate: tx.used_fallback_rate,
            record_id: None,
            error: None,
        }
    }
}

struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// JSONL audit log shared by clones
#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter { path: path.into() })),
        }
    }

    pub async fn prepared(&self, tx: &PendingTransaction) {
        self.append(AuditEntry::for_transaction("prepared", tx)).await;
    }

    pub async fn executed(&self, tx: &PendingTransaction, record_id: u64) {
        let mut entry = AuditEntry::for_transaction("executed", tx);
        entry.record_id = Some(record_id);
        self.append(entry).await;
    }

    pub async fn rejected(&self, tx: &PendingTransaction) {
        self.append(AuditEntry::for_transaction("rejected", tx)).await;
    }

    pub async fn failed(&self, tx: &PendingTransaction, error: &crate::Error) {
        let mut entry = AuditEntry::for_transaction("failed", tx);
        entry.error = Some(error.to_string());
        self.append(entry).await;
    }

    async fn append(&self, entry: AuditEntry<'_>) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, path = %writer.path.display(), "Failed to write audit log entry");
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

/// Read back every entry of an audit file as JSON values.
pub fn read_entries(path: &Path) -> crate::Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(crate::Error::from))
        .collect()
}
