use super::indicators::{EmaCrossover, Macd};
use super::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directional classification of an indicator or of a whole symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Neutral,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "NEUTRAL" => Ok(Signal::Neutral),
            _ => Err(format!("Invalid signal: {}. Valid options: BUY, SELL, NEUTRAL", s)),
        }
    }
}

/// Fixed indicator catalogue.
///
/// Declaration order is catalogue order: it drives the order of the
/// buy/sell sets and of indicator transition events. Names are persisted, so
/// new entries are appended and existing names never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndicatorId {
    #[serde(rename = "EMA_100_Hourly")]
    Ema100Hourly,
    #[serde(rename = "RSI_9_Daily")]
    Rsi9Daily,
    #[serde(rename = "EMA_9_Daily")]
    Ema9Daily,
    #[serde(rename = "EMA_20_Daily")]
    Ema20Daily,
    #[serde(rename = "EMA_50_Daily")]
    Ema50Daily,
    #[serde(rename = "EMA_200_Daily")]
    Ema200Daily,
    #[serde(rename = "MA_Crossover_Daily")]
    MaCrossoverDaily,
    #[serde(rename = "MACD_Daily")]
    MacdDaily,
    #[serde(rename = "Bollinger_Band_Weekly")]
    BollingerBandWeekly,
    #[serde(rename = "EMA_20_Weekly")]
    Ema20Weekly,
}

impl IndicatorId {
    pub const ALL: [IndicatorId; 10] = [
        IndicatorId::Ema100Hourly,
        IndicatorId::Rsi9Daily,
        IndicatorId::Ema9Daily,
        IndicatorId::Ema20Daily,
        IndicatorId::Ema50Daily,
        IndicatorId::Ema200Daily,
        IndicatorId::MaCrossoverDaily,
        IndicatorId::MacdDaily,
        IndicatorId::BollingerBandWeekly,
        IndicatorId::Ema20Weekly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorId::Ema100Hourly => "EMA_100_Hourly",
            IndicatorId::Rsi9Daily => "RSI_9_Daily",
            IndicatorId::Ema9Daily => "EMA_9_Daily",
            IndicatorId::Ema20Daily => "EMA_20_Daily",
            IndicatorId::Ema50Daily => "EMA_50_Daily",
            IndicatorId::Ema200Daily => "EMA_200_Daily",
            IndicatorId::MaCrossoverDaily => "MA_Crossover_Daily",
            IndicatorId::MacdDaily => "MACD_Daily",
            IndicatorId::BollingerBandWeekly => "Bollinger_Band_Weekly",
            IndicatorId::Ema20Weekly => "EMA_20_Weekly",
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        match self {
            IndicatorId::Ema100Hourly => Timeframe::Hourly,
            IndicatorId::BollingerBandWeekly | IndicatorId::Ema20Weekly => Timeframe::Weekly,
            _ => Timeframe::Daily,
        }
    }

    /// Catalogue entries computed from one timeframe's series
    pub fn for_timeframe(timeframe: Timeframe) -> impl Iterator<Item = IndicatorId> {
        Self::ALL
            .into_iter()
            .filter(move |id| id.timeframe() == timeframe)
    }

    pub fn from_name(name: &str) -> Option<IndicatorId> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Raw indicator output, one variant per indicator family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorValue {
    Rsi {
        value: f64,
        period: usize,
    },
    /// EMA compared against the symbol's latest price
    Ema {
        value: f64,
        period: usize,
        price: f64,
    },
    /// Bands compared against the latest close of the band's own series
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
        price: f64,
    },
    Macd(Macd),
    Crossover(EmaCrossover),
}

/// A computed indicator together with its classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub id: IndicatorId,
    pub value: IndicatorValue,
    pub signal: Signal,
}
