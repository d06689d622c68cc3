//! Market data collaborators consumed by the evaluator
//!
//! Implementations must return bars in ascending, deduplicated order;
//! [`PriceSeries::new`] enforces that for anything built through it.

use crate::error::Result;
use crate::models::{PriceSeries, PriceSnapshot, Timeframe};
use async_trait::async_trait;
use chrono::Duration;

/// Historical OHLCV bars for one symbol and timeframe
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, lookback: Duration) -> Result<PriceSeries>;

    /// Whether the source can serve requests at all right now
    fn is_available(&self) -> bool {
        true
    }
}

/// Latest price read for one symbol
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<PriceSnapshot>;

    fn is_available(&self) -> bool {
        true
    }
}
