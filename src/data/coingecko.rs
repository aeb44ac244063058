//! CoinGecko API client
//!
//! This module provides the concrete [`MarketDataSource`] implementation that
//! fetches market rows, the coin list, and historical market charts from the
//! CoinGecko v3 API and maps them into our domain types.

use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use super::{CoinListEntry, CoinSeries, MarketDataSource, MarketEntry, SeriesPoint};

/// Base URL for the CoinGecko v3 API
const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Fixed quote currency for all requests
const VS_CURRENCY: &str = "usd";

/// Header carrying the optional demo API key
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Environment variable the demo API key is read from
const API_KEY_ENV: &str = "COINGECKO_API_KEY";

/// Errors that can occur when talking to the CoinGecko API
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The requested coin id does not exist
    #[error("Coin not found: {0}")]
    NotFound(String),
}

/// Client for the CoinGecko market data API
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGeckoClient {
    /// Create a new client, picking up the demo API key from the environment
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: COINGECKO_BASE_URL.to_string(),
            api_key: std::env::var(API_KEY_ENV).ok(),
        }
    }

    /// Create a new client with a custom HTTP client
    #[allow(dead_code)]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_BASE_URL.to_string(),
            api_key: std::env::var(API_KEY_ENV).ok(),
        }
    }

    /// Create a new client with a custom base URL (for testing)
    #[allow(dead_code)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Issue a GET request and return the response body on success
    ///
    /// 404 responses are mapped to [`ApiError::NotFound`] using `not_found_id`
    /// so callers can distinguish an unknown coin from a transport failure.
    async fn get_text(&self, url: &str, not_found_id: Option<&str>) -> Result<String, ApiError> {
        let mut request = self.client.get(url).header("accept", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(
                not_found_id.unwrap_or("unknown").to_string(),
            ));
        }
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn market_snapshot(&self) -> Result<Vec<MarketEntry>, ApiError> {
        let url = format!(
            "{}/coins/markets?vs_currency={}",
            self.base_url, VS_CURRENCY
        );
        let text = self.get_text(&url, None).await?;
        let rows: Vec<MarketRow> = serde_json::from_str(&text)?;
        Ok(rows.into_iter().map(MarketRow::into_entry).collect())
    }

    async fn coin_list(&self) -> Result<Vec<CoinListEntry>, ApiError> {
        let url = format!("{}/coins/list", self.base_url);
        let text = self.get_text(&url, None).await?;
        let entries: Vec<CoinListEntry> = serde_json::from_str(&text)?;
        Ok(entries)
    }

    async fn coin_series(&self, id: &str, days: u32) -> Result<CoinSeries, ApiError> {
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}",
            self.base_url, id, VS_CURRENCY, days
        );
        let text = self.get_text(&url, Some(id)).await?;
        let chart: MarketChartResponse = serde_json::from_str(&text)?;
        Ok(chart.into_series(id))
    }
}

/// A single market row as returned by /coins/markets
///
/// Numeric fields are nullable in the API; missing values map to zero so the
/// table can always render a full row.
#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    name: String,
    symbol: String,
    #[serde(default)]
    image: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    ath_change_percentage: Option<f64>,
    circulating_supply: Option<f64>,
}

impl MarketRow {
    fn into_entry(self) -> MarketEntry {
        MarketEntry {
            id: self.id,
            name: self.name,
            symbol: self.symbol,
            image: self.image,
            current_price: self.current_price.unwrap_or_default(),
            price_change_percentage_24h: self.price_change_percentage_24h.unwrap_or_default(),
            market_cap: self.market_cap.unwrap_or_default(),
            total_volume: self.total_volume.unwrap_or_default(),
            ath_change_percentage: self.ath_change_percentage.unwrap_or_default(),
            circulating_supply: self.circulating_supply.unwrap_or_default(),
        }
    }
}

/// Response from /coins/{id}/market_chart
///
/// Each series is a list of `[unix_millis, value]` pairs.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<(i64, f64)>,
    market_caps: Vec<(i64, f64)>,
    total_volumes: Vec<(i64, f64)>,
}

impl MarketChartResponse {
    fn into_series(self, id: &str) -> CoinSeries {
        CoinSeries {
            id: id.to_string(),
            prices: convert_points(self.prices),
            market_caps: convert_points(self.market_caps),
            total_volumes: convert_points(self.total_volumes),
        }
    }
}

/// Convert raw `[millis, value]` pairs into series points
///
/// Pairs with timestamps outside the representable range are dropped.
fn convert_points(raw: Vec<(i64, f64)>) -> Vec<SeriesPoint> {
    raw.into_iter()
        .filter_map(|(millis, value)| {
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(|time| SeriesPoint { time, value })
        })
        .collect()
}
