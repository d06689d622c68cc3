use crate::error::{EvaluationError, Result};
use crate::models::{IndicatorThresholds, PriceSeries, SymbolSnapshot, Timeframe};
use crate::services::classifier::SignalClassifier;
use crate::services::indicator_engine::IndicatorEngine;
use crate::services::sources::{SnapshotSource, TimeSeriesSource};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fetch, compute and classify one symbol.
///
/// Cheap to clone: every evaluation task of a batch gets its own copy.
#[derive(Clone)]
pub struct SymbolEvaluator {
    time_series: Arc<dyn TimeSeriesSource>,
    snapshots: Arc<dyn SnapshotSource>,
    engine: IndicatorEngine,
    classifier: SignalClassifier,
    fetch_timeout: Duration,
}

impl SymbolEvaluator {
    pub fn new(
        time_series: Arc<dyn TimeSeriesSource>,
        snapshots: Arc<dyn SnapshotSource>,
        thresholds: IndicatorThresholds,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            time_series,
            snapshots,
            engine: IndicatorEngine::new(thresholds),
            classifier: SignalClassifier::new(thresholds),
            fetch_timeout,
        }
    }

    pub fn with_thresholds(mut self, thresholds: IndicatorThresholds) -> Self {
        self.engine = IndicatorEngine::new(thresholds);
        self.classifier = SignalClassifier::new(thresholds);
        self
    }

    /// Both sources report themselves usable
    pub fn sources_available(&self) -> bool {
        self.time_series.is_available() && self.snapshots.is_available()
    }

    /// Evaluate one symbol. A failed or timed-out fetch fails the whole
    /// symbol; a short series only drops the indicators that need it.
    pub async fn evaluate(&self, symbol: &str) -> std::result::Result<SymbolSnapshot, EvaluationError> {
        let (snapshot, daily, hourly, weekly) = tokio::join!(
            self.bounded(symbol, "price snapshot", self.snapshots.fetch_snapshot(symbol)),
            self.fetch_series(symbol, Timeframe::Daily),
            self.fetch_series(symbol, Timeframe::Hourly),
            self.fetch_series(symbol, Timeframe::Weekly),
        );
        let snapshot = snapshot?;
        let series = [daily?, hourly?, weekly?];

        let values: Vec<_> = series
            .iter()
            .flat_map(|s| self.engine.compute_timeframe(s, snapshot.price))
            .collect();

        debug!(
            symbol,
            price = snapshot.price,
            daily_bars = series[0].len(),
            hourly_bars = series[1].len(),
            weekly_bars = series[2].len(),
            indicators = values.len(),
            "Symbol evaluated"
        );

        Ok(self.classifier.aggregate(symbol, snapshot.price, Utc::now(), values))
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> std::result::Result<PriceSeries, EvaluationError> {
        let what = format!("{} series", timeframe.label().to_lowercase());
        self.bounded(
            symbol,
            &what,
            self.time_series.fetch(symbol, timeframe, timeframe.default_lookback()),
        )
        .await
    }

    async fn bounded<T, F>(&self, symbol: &str, what: &str, fut: F) -> std::result::Result<T, EvaluationError>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.fetch_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EvaluationError::unavailable(symbol, &e)),
            Err(_) => Err(EvaluationError::timeout(symbol, what, self.fetch_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorId, Signal};
    use crate::services::testing::FakeMarket;

    fn evaluator(market: FakeMarket, timeout_ms: u64) -> SymbolEvaluator {
        let market = Arc::new(market);
        SymbolEvaluator::new(
            market.clone(),
            market,
            IndicatorThresholds::default(),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_full_history_evaluates_whole_catalogue() {
        let closes: Vec<f64> = (0..250).map(|i| 100.0 - i as f64 * 0.2).collect();
        let market = FakeMarket::new()
            .with_price("AAPL", 40.0)
            .with_series("AAPL", Timeframe::Daily, closes.clone())
            .with_series("AAPL", Timeframe::Hourly, closes[..120].to_vec())
            .with_series("AAPL", Timeframe::Weekly, closes[..30].to_vec());

        let snapshot = evaluator(market, 1000).evaluate("AAPL").await.unwrap();
        assert_eq!(snapshot.indicators.len(), IndicatorId::ALL.len());
        // Price far below every EMA
        assert_eq!(snapshot.signal_of(IndicatorId::Ema200Daily), Some(Signal::Sell));
        assert_eq!(snapshot.signal_of(IndicatorId::Ema100Hourly), Some(Signal::Sell));
    }

    #[tokio::test]
    async fn test_missing_history_leaves_indicators_absent() {
        let market = FakeMarket::new().with_price("NEW", 10.0);
        let snapshot = evaluator(market, 1000).evaluate("NEW").await.unwrap();
        assert!(snapshot.indicators.is_empty());
        assert_eq!(snapshot.position(), Signal::Neutral);
    }

    #[tokio::test]
    async fn test_stalled_fetch_times_out() {
        let market = FakeMarket::new().with_price("SLOW", 1.0).stall("SLOW");
        let err = evaluator(market, 50).evaluate("SLOW").await.unwrap_err();
        assert!(matches!(err, EvaluationError::Timeout { ref symbol, after_ms: 50, .. } if symbol == "SLOW"));
    }

    #[tokio::test]
    async fn test_source_error_is_data_unavailable() {
        let market = FakeMarket::new().with_price("BAD", 1.0).fail("BAD");
        let err = evaluator(market, 1000).evaluate("BAD").await.unwrap_err();
        assert!(matches!(err, EvaluationError::DataUnavailable { .. }));

        let market = FakeMarket::new();
        let err = evaluator(market, 1000).evaluate("NOPRICE").await.unwrap_err();
        assert!(matches!(err, EvaluationError::DataUnavailable { .. }));
    }
}
