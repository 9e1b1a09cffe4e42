//! Shared test doubles

use crate::amount::Amount;
use crate::notify::{Notifier, TransferEvent};
use crate::oracle::{PriceSource, QuoteProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Mutex;
use std::time::Duration;

/// Well-known development phrase
pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// First account of `TEST_MNEMONIC`
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub fn test_mnemonic() -> SecretString {
    SecretString::from(TEST_MNEMONIC.to_string())
}

/// Price source whose rate can be moved during a test
pub struct MutablePrice {
    rate: Mutex<f64>,
}

impl MutablePrice {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: Mutex::new(rate),
        }
    }

    pub fn set(&self, rate: f64) {
        *self.rate.lock().unwrap() = rate;
    }
}

#[async_trait]
impl PriceSource for MutablePrice {
    async fn fetch_rate(&self) -> Result<f64> {
        Ok(*self.rate.lock().unwrap())
    }
}

/// Price source that is always down
pub struct FailingSource;

#[async_trait]
impl PriceSource for FailingSource {
    async fn fetch_rate(&self) -> Result<f64> {
        Err(Error::QuoteFailed("price source unavailable".to_string()))
    }
}

/// Quote provider with a canned answer
pub struct FixedQuotes {
    native: Option<Amount>,
}

impl FixedQuotes {
    pub fn ok(native: Amount) -> Self {
        Self {
            native: Some(native),
        }
    }

    pub fn failing() -> Self {
        Self { native: None }
    }
}

#[async_trait]
impl QuoteProvider for FixedQuotes {
    async fn quote_native(&self, _fiat_amount: f64) -> Result<Amount> {
        self.native
            .ok_or_else(|| Error::QuoteFailed("no route".to_string()))
    }
}

/// Notifier that remembers every event it receives
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<TransferEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Records events, then reports failure
    pub fn failing() -> Self {
        Self {
            events: Mutex::default(),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Wait up to a second for `count` events from spawned dispatches.
    pub async fn wait_for(&self, count: usize) -> Vec<TransferEvent> {
        for _ in 0..100 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn transaction_completed(&self, event: &TransferEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(Error::Notification("mail server down".to_string()));
        }
        Ok(())
    }
}
