use super::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Basic OHLCV (Open, High, Low, Close, Volume) data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    /// Bar open time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,

    /// Opening price
    pub open: f64,

    /// Highest price
    pub high: f64,

    /// Lowest price
    pub low: f64,

    /// Closing price
    pub close: f64,

    /// Traded volume (fractional for FX and crypto)
    pub volume: f64,
}

impl Ohlcv {
    /// Create a new OHLCV data point
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Ordered bars for one symbol and one timeframe.
///
/// Timestamps are strictly increasing: construction sorts and drops duplicate
/// timestamps, keeping the last occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    bars: Vec<Ohlcv>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, mut bars: Vec<Ohlcv>) -> Self {
        // Stable sort keeps arrival order among equal timestamps, so the
        // reverse scan below sees the latest revision first.
        bars.sort_by_key(|bar| bar.time);

        let mut deduped: Vec<Ohlcv> = Vec::with_capacity(bars.len());
        for bar in bars.into_iter().rev() {
            if deduped.last().map_or(true, |kept| kept.time != bar.time) {
                deduped.push(bar);
            }
        }
        deduped.reverse();

        Self {
            symbol: symbol.into(),
            timeframe,
            bars: deduped,
        }
    }

    pub fn empty(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self::new(symbol, timeframe, Vec::new())
    }

    pub fn bars(&self) -> &[Ohlcv] {
        &self.bars
    }

    /// Close column, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|bar| bar.close)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(secs: i64, close: f64) -> Ohlcv {
        Ohlcv::new(Utc.timestamp_opt(secs, 0).unwrap(), close, close, close, close, 1.0)
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = PriceSeries::new(
            "AAPL",
            Timeframe::Daily,
            vec![bar(300, 3.0), bar(100, 1.0), bar(200, 2.0), bar(200, 2.5)],
        );

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
        assert_eq!(series.last_close(), Some(3.0));
    }

    #[test]
    fn test_empty_series() {
        let series = PriceSeries::empty("AAPL", Timeframe::Weekly);
        assert!(series.is_empty());
        assert_eq!(series.last_close(), None);
    }
}
