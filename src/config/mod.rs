//! Configuration for the mock wallet

pub mod endpoints;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

// Re-export endpoint resolution
pub use endpoints::Endpoints;

/// Rate used when the price provider is unreachable (USD per ETH)
pub const DEFAULT_FALLBACK_RATE: f64 = 3000.0;

/// Public CoinGecko simple price endpoint
pub const DEFAULT_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Skip API direct swap message endpoint
pub const DEFAULT_QUOTE_URL: &str = "https://api.skip.build/v2/fungible/msgs_direct";

/// Local store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the sled database
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("wallet.db"),
        }
    }
}

/// Spot price provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    pub url: Url,
    /// Provider id of the native asset
    pub asset_id: String,
    /// Fiat currency code as the provider spells it
    pub fiat: String,
    pub timeout_secs: u64,
    /// Returned (and flagged) whenever the provider fails
    pub fallback_rate: f64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_PRICE_URL).expect("static URL is valid"),
            asset_id: "ethereum".to_string(),
            fiat: "usd".to_string(),
            timeout_secs: 5,
            fallback_rate: DEFAULT_FALLBACK_RATE,
        }
    }
}

/// Swap quote provider settings (fiat stablecoin -> native)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub enabled: bool,
    pub url: Url,
    /// USDC on Ethereum mainnet
    pub source_asset_denom: String,
    pub source_chain_id: String,
    pub dest_asset_denom: String,
    pub dest_chain_id: String,
    /// Address quoted as the swap recipient; quotes never move funds
    pub quote_address: String,
    pub slippage_tolerance_percent: String,
    pub timeout_secs: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: Url::parse(DEFAULT_QUOTE_URL).expect("static URL is valid"),
            source_asset_denom: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            source_chain_id: "1".to_string(),
            dest_asset_denom: "ethereum-native".to_string(),
            dest_chain_id: "1".to_string(),
            quote_address: "0x742d35Cc6634C0532925a3b8D4C9db96c728b0B4".to_string(),
            slippage_tolerance_percent: "1".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Transfer safety settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// How long a prepared transfer may wait for approval
    pub approval_window_secs: u64,
    /// Maximum rate change between prepare and execute (e.g. 1.0 for 1%)
    pub max_slippage_percent: f64,
    /// Page size for transaction history
    pub history_limit: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            approval_window_secs: 30,
            max_slippage_percent: 1.0,
            history_limit: 50,
        }
    }
}

/// New wallet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Lower bound of the random starting balance (ETH, inclusive)
    pub initial_balance_min: f64,
    /// Upper bound of the random starting balance (ETH, exclusive)
    pub initial_balance_max: f64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            initial_balance_min: 1.0,
            initial_balance_max: 10.0,
        }
    }
}

/// Notification settings
///
/// Credentials are never part of the config file; see
/// [`crate::notify::ResendNotifier::from_env`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send transaction emails instead of only logging them
    pub email: bool,
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub price: PriceConfig,
    pub quote: QuoteConfig,
    pub transfer: TransferConfig,
    pub wallet: WalletConfig,
    pub notifications: NotificationConfig,
    /// Path to the JSONL audit log of transfer lifecycle events
    pub audit_log_path: Option<PathBuf>,
}

impl Config {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.price.fallback_rate.is_finite() && self.price.fallback_rate > 0.0) {
            return Err(Error::Config(format!(
                "price.fallback_rate must be positive, got {}",
                self.price.fallback_rate
            )));
        }
        if !(self.transfer.max_slippage_percent >= 0.0) {
            return Err(Error::Config(
                "transfer.max_slippage_percent must be non-negative".to_string(),
            ));
        }
        if self.transfer.history_limit == 0 {
            return Err(Error::Config(
                "transfer.history_limit must be at least 1".to_string(),
            ));
        }
        let (min, max) = (
            self.wallet.initial_balance_min,
            self.wallet.initial_balance_max,
        );
        if !(min >= 0.0 && min < max && max.is_finite()) {
            return Err(Error::Config(format!(
                "wallet initial balance range [{}, {}) is empty or negative",
                min, max
            )));
        }
        Ok(())
    }
}
