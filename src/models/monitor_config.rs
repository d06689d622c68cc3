use crate::constants::*;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Tunable indicator parameters used by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorThresholds {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
}

impl Default for IndicatorThresholds {
    fn default() -> Self {
        Self {
            rsi_period: RSI_PERIOD,
            rsi_oversold: RSI_OVERSOLD,
            rsi_overbought: RSI_OVERBOUGHT,
            bollinger_period: BOLLINGER_PERIOD,
            bollinger_std_dev: BOLLINGER_STD_DEV,
        }
    }
}

impl IndicatorThresholds {
    /// RSI(14) with 30/70 bands
    pub fn legacy() -> Self {
        Self {
            rsi_period: LEGACY_RSI_PERIOD,
            rsi_oversold: LEGACY_RSI_OVERSOLD,
            rsi_overbought: LEGACY_RSI_OVERBOUGHT,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rsi_period == 0 {
            return Err(AppError::Config("RSI period must be at least 1".to_string()));
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return Err(AppError::Config(format!(
                "RSI bands must satisfy 0 <= oversold < overbought <= 100 (got {} / {})",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if self.bollinger_period < 2 {
            return Err(AppError::Config("Bollinger period must be at least 2".to_string()));
        }
        if !(self.bollinger_std_dev > 0.0) {
            return Err(AppError::Config("Bollinger multiplier must be positive".to_string()));
        }
        Ok(())
    }
}

/// Scheduler cadence and limits
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Symbols evaluated concurrently per batch
    pub batch_size: usize,

    /// Sleep between batches of one cycle
    pub batch_cooldown: Duration,

    /// Sleep after a full cycle
    pub cycle_pause: Duration,

    /// Sleep when the watchlist is empty
    pub idle_retry: Duration,

    /// Sleep when the data source is unavailable
    pub error_retry: Duration,

    /// Bound on every external fetch
    pub fetch_timeout: Duration,

    /// Provider requests allowed per minute across all tasks
    pub rate_limit_per_minute: u32,

    pub thresholds: IndicatorThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_cooldown: Duration::from_millis(DEFAULT_BATCH_COOLDOWN_MS),
            cycle_pause: Duration::from_millis(DEFAULT_CYCLE_PAUSE_MS),
            idle_retry: Duration::from_secs(DEFAULT_IDLE_RETRY_SECS),
            error_retry: Duration::from_secs(DEFAULT_ERROR_RETRY_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            thresholds: IndicatorThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by `MONITOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<usize, _>(&lookup, "MONITOR_BATCH_SIZE")? {
            config.batch_size = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "MONITOR_BATCH_COOLDOWN_MS")? {
            config.batch_cooldown = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "MONITOR_CYCLE_PAUSE_MS")? {
            config.cycle_pause = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "MONITOR_IDLE_RETRY_SECS")? {
            config.idle_retry = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "MONITOR_ERROR_RETRY_SECS")? {
            config.error_retry = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "MONITOR_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "MONITOR_RATE_LIMIT_PER_MINUTE")? {
            config.rate_limit_per_minute = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config("Batch size must be at least 1".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(AppError::Config("Fetch timeout must be non-zero".to_string()));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(AppError::Config("Rate limit must be at least 1 request per minute".to_string()));
        }
        self.thresholds.validate()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.batch_size, 15);
        assert_eq!(config.thresholds.rsi_period, 9);
        assert_eq!(config.thresholds.rsi_oversold, 20.0);
    }

    #[test]
    fn test_env_overrides() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("MONITOR_BATCH_SIZE", "5"),
            ("MONITOR_BATCH_COOLDOWN_MS", "1500"),
            ("MONITOR_FETCH_TIMEOUT_SECS", " 3 "),
            ("MONITOR_ERROR_RETRY_SECS", ""),
        ]))
        .unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_cooldown, Duration::from_millis(1500));
        assert_eq!(config.fetch_timeout, Duration::from_secs(3));
        assert_eq!(config.error_retry, Duration::from_secs(DEFAULT_ERROR_RETRY_SECS));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MonitorConfig::from_lookup(lookup_from(&[("MONITOR_BATCH_SIZE", "many")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = MonitorConfig::from_lookup(lookup_from(&[("MONITOR_BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_thresholds() {
        let legacy = IndicatorThresholds::legacy();
        assert_eq!(legacy.rsi_period, 14);
        assert_eq!((legacy.rsi_oversold, legacy.rsi_overbought), (30.0, 70.0));
        assert!(legacy.validate().is_ok());

        let inverted = IndicatorThresholds { rsi_oversold: 80.0, rsi_overbought: 20.0, ..Default::default() };
        assert!(inverted.validate().is_err());
    }
}
