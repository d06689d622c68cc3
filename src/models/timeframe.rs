use crate::constants::{DAILY_LOOKBACK_DAYS, HOURLY_LOOKBACK_DAYS, WEEKLY_LOOKBACK_WEEKS};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timeframe of a price series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// Hourly candles
    Hourly,
    /// Daily candles
    Daily,
    /// Weekly candles
    Weekly,
}

impl Timeframe {
    /// Suffix used in indicator names ("EMA_100_Hourly")
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Hourly => "Hourly",
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
        }
    }

    /// Aggregate timespan understood by the market-data provider
    pub fn timespan(&self) -> &'static str {
        match self {
            Timeframe::Hourly => "hour",
            Timeframe::Daily => "day",
            Timeframe::Weekly => "week",
        }
    }

    /// File name used by the offline CSV source
    pub fn to_filename(&self) -> &'static str {
        match self {
            Timeframe::Hourly => "1h.csv",
            Timeframe::Daily => "daily.csv",
            Timeframe::Weekly => "weekly.csv",
        }
    }

    /// How far back to request history so every indicator on this timeframe
    /// has enough bars
    pub fn default_lookback(&self) -> Duration {
        match self {
            Timeframe::Hourly => Duration::days(HOURLY_LOOKBACK_DAYS),
            Timeframe::Daily => Duration::days(DAILY_LOOKBACK_DAYS),
            Timeframe::Weekly => Duration::weeks(WEEKLY_LOOKBACK_WEEKS),
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "1H" | "HOURLY" | "HOUR" => Ok(Timeframe::Hourly),
            "1D" | "DAILY" | "DAY" => Ok(Timeframe::Daily),
            "1W" | "WEEKLY" | "WEEK" => Ok(Timeframe::Weekly),
            _ => Err(format!("Invalid timeframe: {}. Valid options: 1H, 1D, 1W", s)),
        }
    }

    /// Get all evaluated timeframes
    pub fn all() -> [Timeframe; 3] {
        [Timeframe::Daily, Timeframe::Hourly, Timeframe::Weekly]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_from_str() {
        assert_eq!(Timeframe::from_str("1D").unwrap(), Timeframe::Daily);
        assert_eq!(Timeframe::from_str("hourly").unwrap(), Timeframe::Hourly);
        assert_eq!(Timeframe::from_str("Week").unwrap(), Timeframe::Weekly);
        assert!(Timeframe::from_str("5m").is_err());
    }

    #[test]
    fn test_default_lookbacks() {
        assert_eq!(Timeframe::Daily.default_lookback().num_days(), 250);
        assert_eq!(Timeframe::Hourly.default_lookback().num_days(), 30);
        assert_eq!(Timeframe::Weekly.default_lookback().num_days(), 210);
    }
}
