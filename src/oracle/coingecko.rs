//! CoinGecko-style spot price source
//!
//! Expects `GET {url}?ids={asset}&vs_currencies={fiat}` to answer
//! `{"<asset>": {"<fiat>": <number>}}`.

use super::PriceSource;
use crate::config::PriceConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const PRO_API_KEY_HEADER: &str = "x-cg-pro-api-key";

pub struct CoinGeckoSource {
    client: reqwest::Client,
    url: Url,
    api_key: Option<SecretString>,
    asset_id: String,
    fiat: String,
}

impl CoinGeckoSource {
    pub fn new(url: Url, api_key: Option<SecretString>, config: &PriceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
            asset_id: config.asset_id.clone(),
            fiat: config.fiat.clone(),
        })
    }

    fn parse_rate(&self, body: &Value) -> Result<f64> {
        body.get(&self.asset_id)
            .and_then(|asset| asset.get(&self.fiat))
            .and_then(Value::as_f64)
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or_else(|| {
                Error::QuoteFailed(format!(
                    "price payload has no positive {}/{} rate",
                    self.asset_id, self.fiat
                ))
            })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch_rate(&self) -> Result<f64> {
        let mut request = self.client.get(self.url.clone()).query(&[
            ("ids", self.asset_id.as_str()),
            ("vs_currencies", self.fiat.as_str()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header(PRO_API_KEY_HEADER, key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::QuoteFailed(format!("price provider returned {}", status)));
        }

        let body: Value = response.json().await?;
        let rate = self.parse_rate(&body)?;
        tracing::debug!(rate, asset = %self.asset_id, fiat = %self.fiat, "Fetched spot price");
        Ok(rate)
    }
}
