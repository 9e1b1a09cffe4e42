//! Native asset amounts
//!
//! Balances are held as an exact number of wei so that every transfer debits
//! exactly what it credits. Floating values only appear at the edges: user
//! input and fiat conversions round to the nearest wei on the way in.

use crate::{Error, Result};
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wei per ether
const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Decimal places of one ether
const ETHER_DECIMALS: usize = 18;

/// Wei per display unit at 6 decimal places
const WEI_PER_MICRO_ETHER: u128 = 1_000_000_000_000;

/// An amount of the native asset, in wei
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::ZERO);

    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Convert a floating ether amount, rounding to the nearest wei.
    ///
    /// Works on the shortest decimal that round-trips to `ether`, so `1.1`
    /// is exactly 1.1 ETH rather than the binary approximation scaled up.
    /// Rejects negative, NaN and infinite values.
    pub fn from_ether_f64(ether: f64) -> Result<Self> {
        if !ether.is_finite() || ether < 0.0 {
            return Err(Error::InvalidAmount(format!("{}", ether)));
        }
        if ether == 0.0 {
            return Ok(Self::ZERO);
        }

        // f64 Display never uses exponent notation
        let decimal = ether.to_string();
        let (whole, frac) = decimal.split_once('.').unwrap_or((decimal.as_str(), ""));
        let too_large = || Error::InvalidAmount(format!("{} is too large", ether));

        let whole = U256::from_str_radix(whole, 10).map_err(|_| too_large())?;
        let mut wei = whole
            .checked_mul(U256::from(WEI_PER_ETHER))
            .ok_or_else(too_large)?;

        let kept = &frac[..frac.len().min(ETHER_DECIMALS)];
        if !kept.is_empty() {
            let padded = format!("{:0<width$}", kept, width = ETHER_DECIMALS);
            let frac_wei = U256::from_str_radix(&padded, 10)
                .map_err(|e| Error::InvalidAmount(format!("{}: {}", ether, e)))?;
            wei = wei.checked_add(frac_wei).ok_or_else(too_large)?;
        }
        // half up on the first digit below one wei
        if frac.as_bytes().get(ETHER_DECIMALS).is_some_and(|d| *d >= b'5') {
            wei = wei.checked_add(U256::from(1u8)).ok_or_else(too_large)?;
        }
        Ok(Self(wei))
    }

    /// Parse a decimal ether string exactly, e.g. `"2.5"`.
    pub fn parse_ether(s: &str) -> Result<Self> {
        parse_ether(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidAmount(format!("{}: {}", s, e)))
    }

    /// Approximate floating value in ether (display and rate math only).
    pub fn to_ether_f64(&self) -> f64 {
        format_ether(self.0).parse::<f64>().unwrap_or(f64::MAX)
    }

    /// Render with exactly six decimals, rounding half up on the wei value.
    ///
    /// This is the form embedded in signed messages, so it must not depend
    /// on floating point formatting.
    pub fn format_fixed6(&self) -> String {
        let micro = (self.0 + U256::from(WEI_PER_MICRO_ETHER / 2)) / U256::from(WEI_PER_MICRO_ETHER);
        let whole = micro / U256::from(1_000_000u64);
        let frac = micro % U256::from(1_000_000u64);
        format!("{}.{:06}", whole, frac.to::<u64>())
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fixed6())
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_ether(s)
    }
}

// Stored as a decimal wei string; JSON numbers cannot hold 256-bit values.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10)
            .map(Amount)
            .map_err(serde::de::Error::custom)
    }
}
