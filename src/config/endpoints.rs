//! Provider endpoint resolution
//!
//! Endpoints are resolved from several sources, highest priority first:
//! 1. Explicit URL env vars (PRICE_API_URL, QUOTE_API_URL)
//! 2. Provider API keys (COINGECKO_API_KEY) - builds the pro URL automatically
//! 3. The config file
//! 4. Public endpoints (rate limited)
//!
//! # Examples
//!
//! ```bash
//! # Option 1: Explicit URLs (e.g. a local price proxy)
//! export PRICE_API_URL="http://localhost:8080/simple/price"
//!
//! # Option 2: CoinGecko pro key
//! export COINGECKO_API_KEY="YOUR_KEY"
//!
//! # Option 3: No env vars - uses the config file or public endpoints
//! ```

use super::Config;
use crate::{Error, Result};
use secrecy::SecretString;
use url::Url;

/// Environment variable names
pub mod env_vars {
    pub const PRICE_API_URL: &str = "PRICE_API_URL";
    pub const QUOTE_API_URL: &str = "QUOTE_API_URL";
    pub const COINGECKO_API_KEY: &str = "COINGECKO_API_KEY";
}

/// CoinGecko pro endpoint, used when an API key is present
const COINGECKO_PRO_PRICE_URL: &str = "https://pro-api.coingecko.com/api/v3/simple/price";

/// Resolved provider endpoints
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub price_url: Url,
    /// Sent as `x-cg-pro-api-key` when set
    pub price_api_key: Option<SecretString>,
    pub quote_url: Url,
}

impl Endpoints {
    /// Resolve from the process environment on top of `config`.
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve using an arbitrary variable lookup.
    pub fn resolve_with<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let price_api_key = non_empty(env_vars::COINGECKO_API_KEY).map(SecretString::from);

        // Priority 1: explicit URL
        let price_url = if let Some(url) = non_empty(env_vars::PRICE_API_URL) {
            tracing::debug!("Using PRICE_API_URL for spot prices");
            parse_url(env_vars::PRICE_API_URL, &url)?
        // Priority 2: pro key implies the pro host
        } else if price_api_key.is_some() {
            tracing::info!("Using CoinGecko pro endpoint from COINGECKO_API_KEY");
            parse_url("coingecko pro", COINGECKO_PRO_PRICE_URL)?
        // Priority 3/4: config file value (which defaults to the public endpoint)
        } else {
            if config.price.url.as_str() == super::DEFAULT_PRICE_URL {
                tracing::debug!("No price endpoint configured, using public API (rate limited)");
            }
            config.price.url.clone()
        };

        let quote_url = match non_empty(env_vars::QUOTE_API_URL) {
            Some(url) => {
                tracing::debug!("Using QUOTE_API_URL for swap quotes");
                parse_url(env_vars::QUOTE_API_URL, &url)?
            }
            None => config.quote.url.clone(),
        };

        Ok(Self {
            price_url,
            price_api_key,
            quote_url,
        })
    }
}

fn parse_url(source: &str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|e| Error::Config(format!("{}: invalid URL: {}", source, e)))
}
