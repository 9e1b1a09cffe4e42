//! Skip API swap quote provider
//!
//! Quotes how much of the native asset a fiat amount buys, routing the fiat
//! side through a 6-decimal stablecoin (USDC). Only the quote is used; the
//! returned swap messages are never signed or submitted.

use super::QuoteProvider;
use crate::amount::Amount;
use crate::config::QuoteConfig;
use crate::{Error, Result};
use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Stablecoin base units per fiat unit
const STABLECOIN_UNITS: f64 = 1_000_000.0;

#[derive(Debug, Deserialize)]
struct MsgsDirectResponse {
    /// Output amount in wei, as a decimal string
    amount_out: String,
}

pub struct SkipQuoteProvider {
    client: reqwest::Client,
    url: Url,
    config: QuoteConfig,
}

impl SkipQuoteProvider {
    pub fn new(url: Url, config: &QuoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url,
            config: config.clone(),
        })
    }

    fn request_body(&self, fiat_amount: f64) -> serde_json::Value {
        let amount_in = ((fiat_amount * STABLECOIN_UNITS) as u64).to_string();
        let mut recipients = serde_json::Map::new();
        recipients.insert(
            self.config.source_chain_id.clone(),
            json!(self.config.quote_address),
        );
        json!({
            "source_asset_denom": self.config.source_asset_denom,
            "source_asset_chain_id": self.config.source_chain_id,
            "dest_asset_denom": self.config.dest_asset_denom,
            "dest_asset_chain_id": self.config.dest_chain_id,
            "amount_in": amount_in,
            "chain_ids_to_addresses": recipients,
            "slippage_tolerance_percent": self.config.slippage_tolerance_percent,
            "smart_swap_options": { "evm_swaps": true },
            "allow_unsafe": false
        })
    }
}

#[async_trait]
impl QuoteProvider for SkipQuoteProvider {
    async fn quote_native(&self, fiat_amount: f64) -> Result<Amount> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&self.request_body(fiat_amount))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::QuoteFailed(format!("quote provider returned {}", status)));
        }

        let body: MsgsDirectResponse = response.json().await?;
        let wei = U256::from_str_radix(body.amount_out.trim(), 10)
            .map_err(|e| Error::QuoteFailed(format!("invalid amount_out: {}", e)))?;

        let native = Amount::from_wei(wei);
        tracing::debug!(fiat_amount, native = %native, "Received swap quote");
        Ok(native)
    }
}
