//! Polygon-compatible REST market data client
//!
//! Serves both the historical aggregates and the latest price. All requests
//! from every concurrent task go through one [`SharedRateLimiter`].

use crate::error::{AppError, Result};
use crate::models::{Ohlcv, PriceSeries, PriceSnapshot, Timeframe};
use crate::services::rate_limiter::SharedRateLimiter;
use crate::services::sources::{SnapshotSource, TimeSeriesSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Market a symbol trades in, derived from its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketType {
    Stocks,
    Forex,
    Crypto,
}

impl MarketType {
    /// `C:EURUSD` is forex, `X:BTCUSD` is crypto, everything else is stocks
    pub fn from_symbol(symbol: &str) -> Self {
        if symbol.starts_with("C:") {
            MarketType::Forex
        } else if symbol.starts_with("X:") {
            MarketType::Crypto
        } else {
            MarketType::Stocks
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Stocks => "stocks",
            MarketType::Forex => "forex",
            MarketType::Crypto => "crypto",
        }
    }

    pub fn locale(&self) -> &'static str {
        match self {
            MarketType::Stocks => "us",
            MarketType::Forex | MarketType::Crypto => "global",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    /// Bar start, milliseconds since epoch
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    ticker: Option<TickerSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerSnapshot {
    last_trade: Option<LastTrade>,
    prev_day: Option<DayBar>,
}

#[derive(Debug, Deserialize)]
struct LastTrade {
    p: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DayBar {
    c: Option<f64>,
}

pub struct PolygonClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: Arc<SharedRateLimiter>,
}

impl PolygonClient {
    pub fn new(api_key: Option<String>, rate_limit_per_minute: u32, timeout: StdDuration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            rate_limiter: Arc::new(SharedRateLimiter::new(rate_limit_per_minute)),
        })
    }

    /// Reads `POLYGON_API_KEY`, falling back to `MASSIVE_API_KEY`
    pub fn from_env(rate_limit_per_minute: u32, timeout: StdDuration) -> Result<Self> {
        let api_key = std::env::var("POLYGON_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("MASSIVE_API_KEY").ok());
        if api_key.is_none() {
            warn!("No POLYGON_API_KEY or MASSIVE_API_KEY set, market data source unavailable");
        }
        Self::new(api_key, rate_limit_per_minute, timeout)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("market data API key not configured".to_string()))?;

        self.rate_limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Provider request");

        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("apiKey", api_key)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimit);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::DataUnavailable(format!("{} not found", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Network(format!("HTTP {} from {}: {}", status, path, truncate(&body, 200))));
        }

        Ok(response.json::<T>().await?)
    }

    async fn previous_close(&self, symbol: &str) -> Result<Option<f64>> {
        let path = format!("/v2/aggs/ticker/{}/prev", symbol);
        let response: AggregatesResponse = self.get(&path, &[("adjusted", "true".to_string())]).await?;
        Ok(response.results.first().map(|bar| bar.c).filter(|c| *c > 0.0))
    }
}

#[async_trait]
impl TimeSeriesSource for PolygonClient {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, lookback: Duration) -> Result<PriceSeries> {
        let end = Utc::now();
        let start = end - lookback;
        let path = format!(
            "/v2/aggs/ticker/{}/range/1/{}/{}/{}",
            symbol,
            timeframe.timespan(),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        );
        let query = [
            ("adjusted", "true".to_string()),
            ("sort", "asc".to_string()),
            ("limit", "50000".to_string()),
        ];

        let response: AggregatesResponse = self.get(&path, &query).await?;
        Ok(PriceSeries::new(symbol, timeframe, bars_from(response)))
    }

    fn is_available(&self) -> bool {
        self.has_api_key()
    }
}

#[async_trait]
impl SnapshotSource for PolygonClient {
    /// Last trade, else previous day close, else the previous-close aggregate
    async fn fetch_snapshot(&self, symbol: &str) -> Result<PriceSnapshot> {
        let market = MarketType::from_symbol(symbol);
        let path = format!(
            "/v2/snapshot/locale/{}/markets/{}/tickers/{}",
            market.locale(),
            market.as_str(),
            symbol
        );

        let snapshot: SnapshotResponse = self.get(&path, &[]).await?;
        let price = match snapshot_price(&snapshot) {
            Some(price) => Some(price),
            None => {
                debug!(symbol, "No trade or previous day in snapshot, using previous close");
                self.previous_close(symbol).await?
            }
        };

        let price = price.ok_or_else(|| AppError::DataUnavailable(format!("no price available for {}", symbol)))?;
        Ok(PriceSnapshot {
            price,
            timestamp: Utc::now(),
        })
    }

    fn is_available(&self) -> bool {
        self.has_api_key()
    }
}

fn bars_from(response: AggregatesResponse) -> Vec<Ohlcv> {
    response
        .results
        .into_iter()
        .filter_map(|bar| {
            let time = DateTime::<Utc>::from_timestamp_millis(bar.t)?;
            Some(Ohlcv::new(time, bar.o, bar.h, bar.l, bar.c, bar.v))
        })
        .collect()
}

fn snapshot_price(snapshot: &SnapshotResponse) -> Option<f64> {
    let ticker = snapshot.ticker.as_ref()?;
    let last_trade = ticker.last_trade.as_ref().and_then(|t| t.p).filter(|p| *p > 0.0);
    let prev_close = ticker.prev_day.as_ref().and_then(|d| d.c).filter(|c| *c > 0.0);
    last_trade.or(prev_close)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
