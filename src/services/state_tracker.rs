use crate::models::{IndicatorId, Signal, SymbolSnapshot, TransitionEvent};
use crate::services::state_store::PersistedState;
use std::collections::HashMap;

/// What one tracked evaluation changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackOutcome {
    /// Indicator transitions in catalogue order, then the position transition
    pub transitions: Vec<TransitionEvent>,
    /// Indicator states to write back to the store
    pub indicator_updates: Vec<(IndicatorId, Signal)>,
    /// New position to write back, when it changed
    pub position_update: Option<Signal>,
}

impl TrackOutcome {
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Last known classification of every (symbol, indicator) pair and of every
/// symbol's position. Unknown pairs start out NEUTRAL.
///
/// Owned by the scheduler and only mutated after a batch's fan-out has
/// returned, so it needs no locking.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    indicators: HashMap<String, HashMap<IndicatorId, Signal>>,
    positions: HashMap<String, Signal>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(state: PersistedState) -> Self {
        Self {
            indicators: state.indicator_states,
            positions: state.position_states,
        }
    }

    pub fn indicator_state(&self, symbol: &str, id: IndicatorId) -> Signal {
        self.indicators
            .get(symbol)
            .and_then(|states| states.get(&id))
            .copied()
            .unwrap_or_default()
    }

    pub fn position(&self, symbol: &str) -> Signal {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    /// Number of symbols with any remembered state
    pub fn symbol_count(&self) -> usize {
        self.indicators
            .keys()
            .chain(self.positions.keys())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// Diff a fresh snapshot against remembered state and remember the new
    /// classifications.
    ///
    /// An indicator missing from the snapshot counts as NEUTRAL, so a
    /// remembered BUY or SELL that drops out emits a transition back to
    /// NEUTRAL. Feeding the same snapshot twice emits nothing the second time.
    pub fn track(&mut self, snapshot: &SymbolSnapshot) -> TrackOutcome {
        let mut outcome = TrackOutcome::default();
        let symbol = snapshot.symbol.as_str();
        let states = self.indicators.entry(symbol.to_string()).or_default();

        for id in IndicatorId::ALL {
            let current = snapshot.signal_of(id).unwrap_or_default();
            let previous = states.get(&id).copied().unwrap_or_default();
            if previous == current {
                continue;
            }
            states.insert(id, current);
            outcome.indicator_updates.push((id, current));
            outcome.transitions.push(TransitionEvent::indicator(
                symbol,
                id,
                previous,
                current,
                snapshot.price,
                snapshot.evaluated_at,
            ));
        }

        let new_position = snapshot.position();
        let previous_position = self.positions.get(symbol).copied().unwrap_or_default();
        if new_position != previous_position {
            self.positions.insert(symbol.to_string(), new_position);
            outcome.position_update = Some(new_position);
            outcome.transitions.push(TransitionEvent::position(
                symbol,
                previous_position,
                new_position,
                snapshot.price,
                snapshot.evaluated_at,
            ));
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorResult, IndicatorValue, Ohlcv, PriceSeries, Timeframe, TransitionKind};
    use crate::services::{IndicatorEngine, SignalClassifier};
    use chrono::{Duration, TimeZone, Utc};

    fn result(id: IndicatorId, signal: Signal) -> IndicatorResult {
        IndicatorResult {
            id,
            value: IndicatorValue::Ema { value: 10.0, period: 20, price: 11.0 },
            signal,
        }
    }

    fn snapshot(symbol: &str, results: Vec<IndicatorResult>) -> SymbolSnapshot {
        SymbolSnapshot::new(symbol, 42.0, Utc::now(), results)
    }

    #[test]
    fn test_first_buy_emits_indicator_then_position() {
        let mut tracker = StateTracker::new();
        let rsi = IndicatorResult {
            id: IndicatorId::Rsi9Daily,
            value: IndicatorValue::Rsi { value: 12.0, period: 9 },
            signal: Signal::Buy,
        };
        let outcome = tracker.track(&snapshot("X", vec![rsi]));

        assert_eq!(outcome.transitions.len(), 2);
        let first = &outcome.transitions[0];
        assert_eq!(first.kind, TransitionKind::Indicator);
        assert_eq!(first.name, "RSI_9_Daily");
        assert_eq!((first.from, first.to), (Signal::Neutral, Signal::Buy));
        let second = &outcome.transitions[1];
        assert_eq!(second.kind, TransitionKind::Position);
        assert_eq!((second.from, second.to), (Signal::Neutral, Signal::Buy));

        assert_eq!(outcome.indicator_updates, vec![(IndicatorId::Rsi9Daily, Signal::Buy)]);
        assert_eq!(outcome.position_update, Some(Signal::Buy));
        assert_eq!(tracker.position("X"), Signal::Buy);
    }

    #[test]
    fn test_identical_refeed_is_silent() {
        let mut tracker = StateTracker::new();
        let snap = snapshot(
            "AAPL",
            vec![
                result(IndicatorId::Ema9Daily, Signal::Sell),
                result(IndicatorId::Ema20Weekly, Signal::Buy),
            ],
        );
        assert!(!tracker.track(&snap).is_empty());
        let again = tracker.track(&snap);
        assert!(again.is_empty());
        assert!(again.indicator_updates.is_empty());
        assert_eq!(again.position_update, None);
    }

    #[test]
    fn test_transitions_follow_catalogue_order() {
        let mut tracker = StateTracker::new();
        let outcome = tracker.track(&snapshot(
            "AAPL",
            vec![
                result(IndicatorId::Ema20Weekly, Signal::Sell),
                result(IndicatorId::Ema100Hourly, Signal::Sell),
                result(IndicatorId::MacdDaily, Signal::Sell),
            ],
        ));
        let names: Vec<&str> = outcome.transitions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["EMA_100_Hourly", "MACD_Daily", "EMA_20_Weekly", "POSITION"]);
    }

    #[test]
    fn test_absent_indicator_reverts_to_neutral() {
        let mut tracker = StateTracker::new();
        tracker.track(&snapshot("AAPL", vec![result(IndicatorId::Ema50Daily, Signal::Buy)]));

        let outcome = tracker.track(&snapshot("AAPL", vec![]));
        let changes: Vec<(TransitionKind, &str, Signal, Signal)> = outcome
            .transitions
            .iter()
            .map(|t| (t.kind, t.name.as_str(), t.from, t.to))
            .collect();
        assert_eq!(
            changes,
            vec![
                (TransitionKind::Indicator, "EMA_50_Daily", Signal::Buy, Signal::Neutral),
                (TransitionKind::Position, "POSITION", Signal::Buy, Signal::Neutral),
            ]
        );
        assert_eq!(outcome.indicator_updates, vec![(IndicatorId::Ema50Daily, Signal::Neutral)]);
        assert_eq!(tracker.indicator_state("AAPL", IndicatorId::Ema50Daily), Signal::Neutral);

        // Coming back emits the indicator again, not just the position
        let outcome = tracker.track(&snapshot("AAPL", vec![result(IndicatorId::Ema50Daily, Signal::Buy)]));
        let names: Vec<&str> = outcome.transitions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["EMA_50_Daily", "POSITION"]);
    }

    #[test]
    fn test_absent_neutral_indicator_is_silent() {
        let mut tracker = StateTracker::new();
        tracker.track(&snapshot("AAPL", vec![result(IndicatorId::Ema9Daily, Signal::Neutral)]));
        assert!(tracker.track(&snapshot("AAPL", vec![])).is_empty());
    }

    #[test]
    fn test_position_can_hold_while_indicators_flip() {
        let mut tracker = StateTracker::new();
        tracker.track(&snapshot("AAPL", vec![result(IndicatorId::Ema9Daily, Signal::Buy)]));

        let outcome = tracker.track(&snapshot(
            "AAPL",
            vec![
                result(IndicatorId::Ema9Daily, Signal::Neutral),
                result(IndicatorId::Ema20Daily, Signal::Buy),
            ],
        ));
        assert_eq!(outcome.transitions.len(), 2);
        assert!(outcome.transitions.iter().all(|t| t.kind == TransitionKind::Indicator));
        assert_eq!(outcome.position_update, None);
    }

    #[test]
    fn test_resumes_from_persisted_state() {
        let mut persisted = PersistedState::default();
        persisted
            .indicator_states
            .entry("AAPL".to_string())
            .or_default()
            .insert(IndicatorId::Ema9Daily, Signal::Buy);
        persisted.position_states.insert("AAPL".to_string(), Signal::Buy);

        let mut tracker = StateTracker::from_persisted(persisted);
        let outcome = tracker.track(&snapshot("AAPL", vec![result(IndicatorId::Ema9Daily, Signal::Buy)]));
        assert!(outcome.is_empty());
        assert_eq!(tracker.symbol_count(), 1);
    }

    #[test]
    fn test_macd_flip_emits_single_buy_at_cross_bar() {
        // Falling then rising: the MACD line crosses its signal line once
        let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        closes.extend((0..40).map(|i| 160.0 + i as f64 * 2.0));
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let engine = IndicatorEngine::default();
        let classifier = SignalClassifier::default();
        let mut tracker = StateTracker::new();
        let mut macd_events = Vec::new();

        for end in 26..=closes.len() {
            let bars = closes[..end]
                .iter()
                .enumerate()
                .map(|(i, &c)| Ohlcv::new(start + Duration::days(i as i64), c, c, c, c, 1000.0))
                .collect();
            let series = PriceSeries::new("TEST", Timeframe::Daily, bars);
            let price = closes[end - 1];
            let value = engine.compute(IndicatorId::MacdDaily, &series, price).unwrap();
            let snap = classifier.aggregate("TEST", price, start, vec![(IndicatorId::MacdDaily, value)]);

            for event in tracker.track(&snap).transitions {
                if event.name == "MACD_Daily" {
                    macd_events.push((end, event.from, event.to));
                }
            }
        }

        let buys: Vec<&(usize, Signal, Signal)> = macd_events.iter().filter(|e| e.2 == Signal::Buy).collect();
        assert_eq!(buys.len(), 1);
        let (cross_end, from, _) = *buys[0];
        assert_eq!(from, Signal::Sell);
        assert_eq!(macd_events.last().map(|e| e.2), Some(Signal::Buy));

        let at = |end: usize| crate::models::indicators::calculate_macd(&closes[..end], 12, 26, 9).unwrap();
        assert!(at(cross_end).macd_line > at(cross_end).signal_line);
        assert!(at(cross_end - 1).macd_line <= at(cross_end - 1).signal_line);
    }
}
