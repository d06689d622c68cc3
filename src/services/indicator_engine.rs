//! Catalogue evaluation
//!
//! Maps each catalogue entry to the math in [`crate::models::indicators`] and
//! the timeframe series it reads. An entry whose series is too short is simply
//! left out of the output.

use crate::constants::*;
use crate::models::indicators::{
    calculate_bollinger_bands, calculate_ema, calculate_ema_crossover, calculate_macd, calculate_rsi,
};
use crate::models::{IndicatorId, IndicatorThresholds, IndicatorValue, PriceSeries};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorEngine {
    thresholds: IndicatorThresholds,
}

impl IndicatorEngine {
    pub fn new(thresholds: IndicatorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &IndicatorThresholds {
        &self.thresholds
    }

    /// Compute every catalogue entry that reads `series`.
    ///
    /// `price` is the symbol's latest snapshot price, the reference for EMA
    /// comparisons. Output follows catalogue order.
    pub fn compute_timeframe(&self, series: &PriceSeries, price: f64) -> Vec<(IndicatorId, IndicatorValue)> {
        let closes = series.closes();

        IndicatorId::for_timeframe(series.timeframe)
            .filter_map(|id| {
                let value = self.compute_from_closes(id, &closes, price);
                if value.is_none() {
                    debug!(
                        symbol = %series.symbol,
                        indicator = id.name(),
                        bars = closes.len(),
                        "Insufficient history, indicator absent"
                    );
                }
                value.map(|v| (id, v))
            })
            .collect()
    }

    /// Compute one catalogue entry, `None` when the series does not belong to
    /// the entry's timeframe or is too short
    pub fn compute(&self, id: IndicatorId, series: &PriceSeries, price: f64) -> Option<IndicatorValue> {
        if series.timeframe != id.timeframe() {
            return None;
        }
        self.compute_from_closes(id, &series.closes(), price)
    }

    fn compute_from_closes(&self, id: IndicatorId, closes: &[f64], price: f64) -> Option<IndicatorValue> {
        match id {
            IndicatorId::Ema100Hourly => ema_value(closes, HOURLY_EMA_PERIOD, price),
            IndicatorId::Ema9Daily => ema_value(closes, DAILY_EMA_PERIODS[0], price),
            IndicatorId::Ema20Daily => ema_value(closes, DAILY_EMA_PERIODS[1], price),
            IndicatorId::Ema50Daily => ema_value(closes, DAILY_EMA_PERIODS[2], price),
            IndicatorId::Ema200Daily => ema_value(closes, DAILY_EMA_PERIODS[3], price),
            IndicatorId::Ema20Weekly => ema_value(closes, WEEKLY_EMA_PERIOD, price),
            IndicatorId::Rsi9Daily => {
                let period = self.thresholds.rsi_period;
                calculate_rsi(closes, period).map(|value| IndicatorValue::Rsi { value, period })
            }
            IndicatorId::MaCrossoverDaily => {
                calculate_ema_crossover(closes, CROSSOVER_FAST, CROSSOVER_SLOW).map(IndicatorValue::Crossover)
            }
            IndicatorId::MacdDaily => {
                calculate_macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL).map(IndicatorValue::Macd)
            }
            IndicatorId::BollingerBandWeekly => {
                let bands = calculate_bollinger_bands(
                    closes,
                    self.thresholds.bollinger_period,
                    self.thresholds.bollinger_std_dev,
                )?;
                // Bands are judged against the band series' own latest close
                let last_close = *closes.last()?;
                Some(IndicatorValue::Bollinger {
                    upper: bands.upper,
                    middle: bands.middle,
                    lower: bands.lower,
                    price: last_close,
                })
            }
        }
    }
}

/// Per-period EMA entries need a full period, even though the EMA helper
/// itself falls back to a continuous seed on short input
fn ema_value(closes: &[f64], period: usize, price: f64) -> Option<IndicatorValue> {
    if closes.len() < period {
        return None;
    }
    let value = calculate_ema(closes, period).last().copied().flatten()?;
    Some(IndicatorValue::Ema { value, period, price })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ohlcv, Timeframe};
    use chrono::{Duration, TimeZone, Utc};

    fn series(timeframe: Timeframe, closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Ohlcv::new(start + Duration::hours(i as i64), c, c, c, c, 1000.0))
            .collect();
        PriceSeries::new("TEST", timeframe, bars)
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_daily_full_history_produces_all_daily_entries() {
        let engine = IndicatorEngine::default();
        let values = engine.compute_timeframe(&series(Timeframe::Daily, &rising(250)), 400.0);
        let ids: Vec<IndicatorId> = values.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, IndicatorId::for_timeframe(Timeframe::Daily).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_daily_history_drops_long_periods() {
        let engine = IndicatorEngine::default();
        let values = engine.compute_timeframe(&series(Timeframe::Daily, &rising(30)), 200.0);
        let ids: Vec<IndicatorId> = values.iter().map(|(id, _)| *id).collect();

        assert!(ids.contains(&IndicatorId::Rsi9Daily));
        assert!(ids.contains(&IndicatorId::Ema20Daily));
        assert!(ids.contains(&IndicatorId::MacdDaily));
        assert!(ids.contains(&IndicatorId::MaCrossoverDaily));
        assert!(!ids.contains(&IndicatorId::Ema50Daily));
        assert!(!ids.contains(&IndicatorId::Ema200Daily));
    }

    #[test]
    fn test_empty_series_yields_nothing() {
        let engine = IndicatorEngine::default();
        for timeframe in Timeframe::all() {
            assert!(engine
                .compute_timeframe(&PriceSeries::empty("TEST", timeframe), 1.0)
                .is_empty());
        }
    }

    #[test]
    fn test_ema_carries_snapshot_price() {
        let engine = IndicatorEngine::default();
        let value = engine
            .compute(IndicatorId::Ema100Hourly, &series(Timeframe::Hourly, &rising(120)), 321.0)
            .unwrap();
        match value {
            IndicatorValue::Ema { period, price, .. } => {
                assert_eq!(period, 100);
                assert_eq!(price, 321.0);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_bollinger_uses_last_weekly_close() {
        let engine = IndicatorEngine::default();
        let value = engine
            .compute(IndicatorId::BollingerBandWeekly, &series(Timeframe::Weekly, &rising(30)), 999.0)
            .unwrap();
        match value {
            IndicatorValue::Bollinger { price, lower, upper, .. } => {
                assert_eq!(price, 129.0);
                assert!(lower < upper);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_wrong_timeframe_is_absent() {
        let engine = IndicatorEngine::default();
        assert!(engine
            .compute(IndicatorId::MacdDaily, &series(Timeframe::Weekly, &rising(60)), 1.0)
            .is_none());
    }

    #[test]
    fn test_rsi_period_follows_thresholds() {
        let engine = IndicatorEngine::new(IndicatorThresholds::legacy());
        let closes = rising(14);
        // 14 closes give 13 deltas: not enough for RSI(14)
        assert!(engine
            .compute(IndicatorId::Rsi9Daily, &series(Timeframe::Daily, &closes), 1.0)
            .is_none());

        let value = engine
            .compute(IndicatorId::Rsi9Daily, &series(Timeframe::Daily, &rising(15)), 1.0)
            .unwrap();
        assert_eq!(value, IndicatorValue::Rsi { value: 100.0, period: 14 });
    }
}
