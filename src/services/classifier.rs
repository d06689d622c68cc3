use crate::models::{
    IndicatorId, IndicatorResult, IndicatorThresholds, IndicatorValue, Signal, SymbolSnapshot,
};
use chrono::{DateTime, Utc};

/// Maps raw indicator values to BUY/SELL/NEUTRAL
///
/// | Indicator    | BUY                     | SELL                    |
/// |--------------|-------------------------|-------------------------|
/// | RSI          | value < oversold        | value > overbought      |
/// | Bollinger    | price < lower band      | price > upper band      |
/// | EMA          | price > EMA             | price < EMA             |
/// | MA crossover | fast crosses above slow | fast crosses below slow |
/// | MACD         | line > signal           | line < signal           |
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalClassifier {
    thresholds: IndicatorThresholds,
}

impl SignalClassifier {
    pub fn new(thresholds: IndicatorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, value: &IndicatorValue) -> Signal {
        match *value {
            IndicatorValue::Rsi { value, .. } => {
                if value < self.thresholds.rsi_oversold {
                    Signal::Buy
                } else if value > self.thresholds.rsi_overbought {
                    Signal::Sell
                } else {
                    Signal::Neutral
                }
            }
            IndicatorValue::Bollinger { upper, lower, price, .. } => {
                if price < lower {
                    Signal::Buy
                } else if price > upper {
                    Signal::Sell
                } else {
                    Signal::Neutral
                }
            }
            IndicatorValue::Ema { value, price, .. } => compare(price, value),
            IndicatorValue::Crossover(crossover) => {
                if crossover.crossed_above() {
                    Signal::Buy
                } else if crossover.crossed_below() {
                    Signal::Sell
                } else {
                    Signal::Neutral
                }
            }
            IndicatorValue::Macd(macd) => compare(macd.macd_line, macd.signal_line),
        }
    }

    /// Classify every present indicator and build the symbol snapshot with
    /// its buy/sell sets
    pub fn aggregate<I>(&self, symbol: &str, price: f64, evaluated_at: DateTime<Utc>, values: I) -> SymbolSnapshot
    where
        I: IntoIterator<Item = (IndicatorId, IndicatorValue)>,
    {
        let results = values.into_iter().map(|(id, value)| IndicatorResult {
            id,
            signal: self.classify(&value),
            value,
        });
        SymbolSnapshot::new(symbol, price, evaluated_at, results)
    }
}

fn compare(lhs: f64, rhs: f64) -> Signal {
    if lhs > rhs {
        Signal::Buy
    } else if lhs < rhs {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
