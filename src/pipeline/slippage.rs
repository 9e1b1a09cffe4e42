//! Slippage guard
//!
//! Blocks fiat-denominated transfers whose exchange rate moved more than the
//! configured tolerance between preparation and execution.

use crate::{Error, Result};

/// Default tolerance, in percent
pub const DEFAULT_MAX_SLIPPAGE_PERCENT: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct SlippageGuard {
    /// Maximum allowed rate movement (e.g., 1.0 for 1%)
    max_slippage_percent: f64,
}

impl SlippageGuard {
    pub fn new(max_slippage_percent: f64) -> Self {
        Self {
            max_slippage_percent,
        }
    }

    pub fn max_slippage_percent(&self) -> f64 {
        self.max_slippage_percent
    }

    /// Compare the rate a transfer was quoted at with the current one.
    ///
    /// Returns the relative change in percent. A change exactly equal to the
    /// tolerance passes.
    pub fn check(&self, original_rate: f64, current_rate: f64) -> Result<f64> {
        if !(original_rate.is_finite() && original_rate > 0.0 && current_rate.is_finite()) {
            return Err(Error::QuoteUnavailable(format!(
                "cannot compare rates {} and {}",
                original_rate, current_rate
            )));
        }

        // compare as fractions so 1% is the same float on both sides
        let change = (current_rate - original_rate).abs() / original_rate;
        let limit = self.max_slippage_percent / 100.0;

        if change > limit {
            return Err(Error::PriceSlippage {
                change_percent: change * 100.0,
                max_percent: self.max_slippage_percent,
            });
        }

        tracing::debug!(
            original_rate,
            current_rate,
            change_percent = change * 100.0,
            max_slippage = self.max_slippage_percent,
            "Slippage check passed"
        );
        Ok(change * 100.0)
    }
}

impl Default for SlippageGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SLIPPAGE_PERCENT)
    }
}
