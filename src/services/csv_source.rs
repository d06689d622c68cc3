//! Offline market data from CSV files
//!
//! Layout: `{data_dir}/{SYMBOL}/{daily.csv|1h.csv|weekly.csv}` with the header
//! `time,open,high,low,close,volume`. Symbols containing `:` (`X:BTCUSD`) use
//! `_` in the directory name.

use crate::error::{AppError, Result};
use crate::models::{Ohlcv, PriceSeries, PriceSnapshot, Timeframe};
use crate::services::sources::{SnapshotSource, TimeSeriesSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvBar {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Clone)]
pub struct CsvSource {
    data_dir: PathBuf,
}

impl CsvSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(symbol.replace(':', "_"))
    }

    async fn read_series(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries> {
        let symbol_dir = self.symbol_dir(symbol);
        if !tokio::fs::try_exists(&symbol_dir).await.unwrap_or(false) {
            return Err(AppError::DataUnavailable(format!(
                "no data directory for {} at {}",
                symbol,
                symbol_dir.display()
            )));
        }

        let path = symbol_dir.join(timeframe.to_filename());
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(symbol, timeframe = %timeframe, "No CSV for timeframe, empty series");
            return Ok(PriceSeries::empty(symbol, timeframe));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let bars = parse_bars(&content)
            .map_err(|e| AppError::Parse(format!("{}: {}", path.display(), e)))?;
        Ok(PriceSeries::new(symbol, timeframe, bars))
    }
}

#[async_trait]
impl TimeSeriesSource for CsvSource {
    /// Bars within `lookback` of the file's latest bar, so recorded data can
    /// be replayed regardless of the wall clock
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, lookback: Duration) -> Result<PriceSeries> {
        let series = self.read_series(symbol, timeframe).await?;
        let Some(last) = series.bars().last() else {
            return Ok(series);
        };

        let cutoff = last.time - lookback;
        let bars = series
            .bars()
            .iter()
            .filter(|bar| bar.time >= cutoff)
            .cloned()
            .collect();
        Ok(PriceSeries::new(symbol, timeframe, bars))
    }

    fn is_available(&self) -> bool {
        self.data_dir.is_dir()
    }
}

#[async_trait]
impl SnapshotSource for CsvSource {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<PriceSnapshot> {
        let series = self.read_series(symbol, Timeframe::Daily).await?;
        let last = series
            .bars()
            .last()
            .ok_or_else(|| AppError::DataUnavailable(format!("no daily bars for {}", symbol)))?;
        Ok(PriceSnapshot {
            price: last.close,
            timestamp: last.time,
        })
    }

    fn is_available(&self) -> bool {
        self.data_dir.is_dir()
    }
}

fn parse_bars(content: &str) -> Result<Vec<Ohlcv>> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for record in reader.deserialize::<CsvBar>() {
        let record = record?;
        let time = parse_time(&record.time)?;
        bars.push(Ohlcv::new(time, record.open, record.high, record.low, record.close, record.volume));
    }

    Ok(bars)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`, all read as UTC
fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(AppError::Parse(format!("unrecognised timestamp '{}'", raw)))
}
