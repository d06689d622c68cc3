use super::{IndicatorId, IndicatorResult, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest price read for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of evaluating one symbol in one pass.
///
/// Rebuilt from scratch on every evaluation, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub price: f64,
    pub evaluated_at: DateTime<Utc>,
    /// Present indicators only, keyed in catalogue order
    pub indicators: BTreeMap<IndicatorId, IndicatorResult>,
    pub buy_signals: Vec<IndicatorId>,
    pub sell_signals: Vec<IndicatorId>,
}

impl SymbolSnapshot {
    /// Build a snapshot and derive the buy/sell sets from the results
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        evaluated_at: DateTime<Utc>,
        results: impl IntoIterator<Item = IndicatorResult>,
    ) -> Self {
        let indicators: BTreeMap<IndicatorId, IndicatorResult> =
            results.into_iter().map(|result| (result.id, result)).collect();

        let with_signal = |wanted: Signal| -> Vec<IndicatorId> {
            indicators
                .values()
                .filter(|result| result.signal == wanted)
                .map(|result| result.id)
                .collect()
        };
        let buy_signals = with_signal(Signal::Buy);
        let sell_signals = with_signal(Signal::Sell);

        Self {
            symbol: symbol.into(),
            price,
            evaluated_at,
            indicators,
            buy_signals,
            sell_signals,
        }
    }

    /// Aggregate trading position for this evaluation
    pub fn position(&self) -> Signal {
        aggregate_position(&self.buy_signals, &self.sell_signals)
    }

    /// Classification of one indicator, `None` when it was absent
    pub fn signal_of(&self, id: IndicatorId) -> Option<Signal> {
        self.indicators.get(&id).map(|result| result.signal)
    }
}

/// BUY when only buy signals are present, SELL when only sell signals are
/// present, NEUTRAL otherwise. Conflicting signals neutralize.
pub fn aggregate_position(buy_signals: &[IndicatorId], sell_signals: &[IndicatorId]) -> Signal {
    match (buy_signals.is_empty(), sell_signals.is_empty()) {
        (false, true) => Signal::Buy,
        (true, false) => Signal::Sell,
        _ => Signal::Neutral,
    }
}
