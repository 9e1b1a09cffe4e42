//! Interactive session state
//!
//! Holds the connected wallet and at most one transfer awaiting approval.
//!
//! SECURITY: the mnemonic stays wrapped in a `SecretString` for the lifetime
//! of the session and is dropped (and zeroized) on disconnect.

use crate::pipeline::{ApprovalWindow, PendingTransaction};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use secrecy::SecretString;

struct ConnectedWallet {
    address: String,
    mnemonic: SecretString,
}

#[derive(Default)]
pub struct Session {
    wallet: Option<ConnectedWallet>,
    pending: Option<PendingTransaction>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a wallet, discarding any transfer of the previous one.
    pub fn connect(&mut self, address: String, mnemonic: SecretString) {
        self.pending = None;
        self.wallet = Some(ConnectedWallet { address, mnemonic });
    }

    pub fn disconnect(&mut self) {
        self.pending = None;
        self.wallet = None;
    }

    pub fn is_connected(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn address(&self) -> Result<&str> {
        self.wallet
            .as_ref()
            .map(|w| w.address.as_str())
            .ok_or(Error::NotConnected)
    }

    pub fn mnemonic(&self) -> Result<&SecretString> {
        self.wallet
            .as_ref()
            .map(|w| &w.mnemonic)
            .ok_or(Error::NotConnected)
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    /// Store a prepared transfer; fails while another one is pending.
    pub fn set_pending(&mut self, pending: PendingTransaction) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::TransactionPending);
        }
        self.pending = Some(pending);
        Ok(())
    }

    /// Remove the pending transfer for approval.
    pub fn take_pending(&mut self) -> Result<PendingTransaction> {
        self.pending.take().ok_or(Error::NoPendingTransaction)
    }

    /// Remove the pending transfer together with the key to sign it.
    ///
    /// The transfer stays in place when no wallet is connected.
    pub fn take_for_approval(&mut self) -> Result<(PendingTransaction, &SecretString)> {
        let wallet = self.wallet.as_ref().ok_or(Error::NotConnected)?;
        let pending = self.pending.take().ok_or(Error::NoPendingTransaction)?;
        Ok((pending, &wallet.mnemonic))
    }

    /// Drop the pending transfer without executing it.
    pub fn reject(&mut self) -> Result<PendingTransaction> {
        self.take_pending()
    }

    /// Drop the pending transfer if its window has passed.
    pub fn clear_expired(
        &mut self,
        window: &ApprovalWindow,
        now: DateTime<Utc>,
    ) -> Option<PendingTransaction> {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|pending| window.is_expired(pending.created_at, now));
        if expired {
            self.pending.take()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.wallet.as_ref().map(|w| &w.address))
            .field("pending", &self.pending.as_ref().map(|p| p.id))
            .finish()
    }
}
