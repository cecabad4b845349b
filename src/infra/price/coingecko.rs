//! CoinGecko price source.
//!
//! Reads the USD quote for SOL from the public `simple/price` endpoint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::domain::{AppError, ExternalServiceError, PriceQuoteSource};

/// Default CoinGecko API base URL
pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko id of the native asset
pub const DEFAULT_PRICE_ASSET_ID: &str = "solana";

const QUOTE_CURRENCY: &str = "usd";

#[derive(Debug, Deserialize)]
struct Quote {
    usd: Option<f64>,
}

/// Price source backed by CoinGecko's `simple/price` endpoint
#[derive(Debug, Clone)]
pub struct CoinGeckoPriceSource {
    http_client: Client,
    base_url: String,
    asset_id: String,
}

impl CoinGeckoPriceSource {
    /// Create a new CoinGecko source
    ///
    /// # Arguments
    /// * `base_url` - Optional API base URL. Defaults to the public endpoint.
    /// * `asset_id` - Optional CoinGecko asset id. Defaults to `solana`.
    pub fn new(base_url: Option<String>, asset_id: Option<String>) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ExternalService(ExternalServiceError::Network(e.to_string())))?;

        Ok(Self {
            http_client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            asset_id: asset_id.unwrap_or_else(|| DEFAULT_PRICE_ASSET_ID.to_string()),
        })
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }
}

#[async_trait]
impl PriceQuoteSource for CoinGeckoPriceSource {
    #[instrument(skip(self), fields(asset = %self.asset_id))]
    async fn fetch_rate(&self) -> Result<f64, AppError> {
        let url = format!("{}/simple/price", self.base_url);
        debug!(url = %url, "Requesting exchange rate");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("ids", self.asset_id.as_str()),
                ("vs_currencies", QUOTE_CURRENCY),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Price API request failed");
                AppError::ExternalService(ExternalServiceError::Network(e.to_string()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Price API returned error");
            return Err(AppError::ExternalService(ExternalServiceError::ApiError {
                status_code: status.as_u16(),
                message: body,
            }));
        }

        let quotes: HashMap<String, Quote> = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse price response");
            AppError::ExternalService(ExternalServiceError::ParseError(e.to_string()))
        })?;

        let rate = quotes
            .get(&self.asset_id)
            .and_then(|quote| quote.usd)
            .ok_or_else(|| {
                AppError::ExternalService(ExternalServiceError::ParseError(format!(
                    "No {} quote for {}",
                    QUOTE_CURRENCY, self.asset_id
                )))
            })?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(AppError::ExternalService(ExternalServiceError::ParseError(
                format!("Unusable rate {}", rate),
            )));
        }

        debug!(rate = rate, "Exchange rate received");
        Ok(rate)
    }
}
