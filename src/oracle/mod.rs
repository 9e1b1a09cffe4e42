//! Price oracle
//!
//! Converts between the native asset and a fiat unit. Two providers sit
//! behind it:
//! - a spot price source (`PriceSource`), whose failures resolve to a fixed
//!   fallback rate, and
//! - an optional swap quote provider (`QuoteProvider`) used for fiat
//!   conversions, whose failures resolve to `fiat / spot rate`.
//!
//! Every fallback use is flagged on the returned value.

mod coingecko;
mod skip;

pub use coingecko::CoinGeckoSource;
pub use skip::SkipQuoteProvider;

use crate::amount::Amount;
use crate::config::Config;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Fetches fiat units per one native unit
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_rate(&self) -> Result<f64>;
}

/// Converts a fiat amount to a native amount via a swap route
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote_native(&self, fiat_amount: f64) -> Result<Amount>;
}

/// Spot rate with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateReading {
    pub rate: f64,
    pub used_fallback: bool,
}

/// Result of converting a fiat amount
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub native_amount: Amount,
    pub fiat_amount: f64,
    /// Fiat units per native unit implied by this quote
    pub rate: f64,
    pub used_fallback: bool,
}

/// Price oracle with fallback
pub struct PriceOracle {
    source: Arc<dyn PriceSource>,
    quotes: Option<Arc<dyn QuoteProvider>>,
    fallback_rate: f64,
}

impl PriceOracle {
    pub fn new(source: Arc<dyn PriceSource>, fallback_rate: f64) -> Self {
        Self {
            source,
            quotes: None,
            fallback_rate,
        }
    }

    /// Route fiat conversions through a swap quote provider first
    pub fn with_quote_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.quotes = Some(provider);
        self
    }

    /// Build the HTTP-backed oracle described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoints = crate::config::Endpoints::from_env(config)?;
        let source = CoinGeckoSource::new(
            endpoints.price_url.clone(),
            endpoints.price_api_key.clone(),
            &config.price,
        )?;
        let mut oracle = Self::new(Arc::new(source), config.price.fallback_rate);
        if config.quote.enabled {
            let provider = SkipQuoteProvider::new(endpoints.quote_url, &config.quote)?;
            oracle = oracle.with_quote_provider(Arc::new(provider));
        }
        Ok(oracle)
    }

    pub fn fallback_rate(&self) -> f64 {
        self.fallback_rate
    }

    /// Current rate; never fails.
    pub async fn current_rate(&self) -> RateReading {
        match self.source.fetch_rate().await {
            Ok(rate) if rate.is_finite() && rate > 0.0 => RateReading {
                rate,
                used_fallback: false,
            },
            Ok(rate) => {
                tracing::warn!(rate, fallback = self.fallback_rate, "Price provider returned unusable rate, using fallback");
                self.fallback_reading()
            }
            Err(e) => {
                tracing::warn!(error = %e, fallback = self.fallback_rate, "Price provider failed, using fallback");
                self.fallback_reading()
            }
        }
    }

    /// Convert `fiat_amount` to the native asset.
    ///
    /// Fails with `QuoteFailed` only when neither the quote provider nor the
    /// spot-rate computation yields a usable amount.
    pub async fn quote(&self, fiat_amount: f64) -> Result<Quote> {
        if !(fiat_amount.is_finite() && fiat_amount > 0.0) {
            return Err(Error::QuoteFailed(format!(
                "fiat amount must be positive, got {}",
                fiat_amount
            )));
        }

        let primary_error = match &self.quotes {
            Some(provider) => match provider.quote_native(fiat_amount).await {
                Ok(native) if !native.is_zero() => {
                    return Ok(Quote {
                        native_amount: native,
                        fiat_amount,
                        rate: fiat_amount / native.to_ether_f64(),
                        used_fallback: false,
                    });
                }
                Ok(_) => Some("quote provider returned zero output".to_string()),
                Err(e) => Some(e.to_string()),
            },
            None => None,
        };

        if let Some(ref error) = primary_error {
            tracing::warn!(error = %error, fiat_amount, "Swap quote failed, converting at spot rate");
        }

        let reading = self.current_rate().await;
        self.convert_at(fiat_amount, reading)
            .map(|quote| Quote {
                // a failed provider always means this is a fallback quote
                used_fallback: quote.used_fallback || primary_error.is_some(),
                ..quote
            })
            .map_err(|fallback_error| match primary_error {
                Some(primary) => Error::QuoteFailed(format!(
                    "{}. Fallback failed: {}",
                    primary, fallback_error
                )),
                None => fallback_error,
            })
    }

    fn convert_at(&self, fiat_amount: f64, reading: RateReading) -> Result<Quote> {
        if !(reading.rate.is_finite() && reading.rate > 0.0) {
            return Err(Error::QuoteFailed(format!("unusable rate {}", reading.rate)));
        }
        let native_amount = Amount::from_ether_f64(fiat_amount / reading.rate)
            .map_err(|e| Error::QuoteFailed(e.to_string()))?;
        Ok(Quote {
            native_amount,
            fiat_amount,
            rate: reading.rate,
            used_fallback: reading.used_fallback,
        })
    }

    fn fallback_reading(&self) -> RateReading {
        RateReading {
            rate: self.fallback_rate,
            used_fallback: true,
        }
    }
}
