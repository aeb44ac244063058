//! Core data models for coindeck
//!
//! This module contains the data types used throughout the application for
//! representing market rows, the searchable coin list, and historical series,
//! plus the abstract data source the cache layer fetches through.

pub mod coingecko;

pub use coingecko::{ApiError, CoinGeckoClient};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the market overview table
///
/// An immutable snapshot row; a market fetch replaces the whole collection
/// atomically, individual rows are never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    /// API identifier (e.g. "bitcoin")
    pub id: String,
    /// Display name (e.g. "Bitcoin")
    pub name: String,
    /// Ticker symbol (e.g. "btc")
    pub symbol: String,
    /// URL of the coin's logo image
    pub image: String,
    /// Current price in the configured currency
    pub current_price: f64,
    /// Price change over the last 24 hours, in percent
    pub price_change_percentage_24h: f64,
    /// Total market capitalization
    pub market_cap: f64,
    /// Trading volume over the last 24 hours
    pub total_volume: f64,
    /// Distance from the all-time high, in percent (negative below ATH)
    pub ath_change_percentage: f64,
    /// Circulating supply in coin units
    pub circulating_supply: f64,
}

/// A single entry of the full coin list
///
/// Used only for exact name/symbol to id resolution in search; refreshed
/// rarely because the list is large and changes slowly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinListEntry {
    /// API identifier (e.g. "ethereum")
    pub id: String,
    /// Display name (e.g. "Ethereum")
    pub name: String,
    /// Ticker symbol (e.g. "eth")
    pub symbol: String,
}

/// One (timestamp, value) observation of a historical series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Observation time
    pub time: DateTime<Utc>,
    /// Observed value (price, market cap, or volume)
    pub value: f64,
}

/// Historical series for one coin over the configured window
///
/// The three sequences are ordered by timestamp ascending but are not
/// guaranteed to have equal lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSeries {
    /// API identifier of the coin this series belongs to
    pub id: String,
    /// Price observations
    pub prices: Vec<SeriesPoint>,
    /// Market cap observations
    pub market_caps: Vec<SeriesPoint>,
    /// Volume observations
    pub total_volumes: Vec<SeriesPoint>,
}

impl CoinSeries {
    /// Latest price observation, if the series is non-empty
    pub fn latest_price(&self) -> Option<f64> {
        self.prices.last().map(|p| p.value)
    }

    /// Latest market cap observation, if the series is non-empty
    pub fn latest_market_cap(&self) -> Option<f64> {
        self.market_caps.last().map(|p| p.value)
    }

    /// Latest volume observation, if the series is non-empty
    pub fn latest_volume(&self) -> Option<f64> {
        self.total_volumes.last().map(|p| p.value)
    }

    /// Approximate change over the trailing 24 observations, in percent
    ///
    /// The hourly granularity of the 7-day window makes 24 points roughly one
    /// day. Returns `None` when there are not enough points or the reference
    /// price is zero.
    pub fn day_change_percent(&self) -> Option<f64> {
        let latest = self.prices.last()?.value;
        let len = self.prices.len();
        if len < 24 {
            return None;
        }
        let previous = self.prices[len - 24].value;
        if previous == 0.0 {
            return None;
        }
        Some((latest - previous) / previous * 100.0)
    }
}

/// Abstract read-only market data source consumed by the cache layer
///
/// The store only depends on this trait; the real CoinGecko client and the
/// fake fetchers used in tests both implement it.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch one page of market rows in the configured currency
    async fn market_snapshot(&self) -> Result<Vec<MarketEntry>, ApiError>;

    /// Fetch the full coin list used for search resolution
    async fn coin_list(&self) -> Result<Vec<CoinListEntry>, ApiError>;

    /// Fetch the historical series for one coin over a trailing day window
    async fn coin_series(&self, id: &str, days: u32) -> Result<CoinSeries, ApiError>;
}
