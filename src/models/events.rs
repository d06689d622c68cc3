use super::{IndicatorId, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What changed: one indicator, or the symbol's aggregate position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransitionKind {
    Indicator,
    Position,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Indicator => "INDICATOR",
            TransitionKind::Position => "POSITION",
        }
    }
}

/// A classification change detected between two consecutive evaluations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub symbol: String,
    pub kind: TransitionKind,
    /// Indicator name, or "POSITION" for position transitions
    pub name: String,
    pub from: Signal,
    pub to: Signal,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn indicator(
        symbol: &str,
        id: IndicatorId,
        from: Signal,
        to: Signal,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind: TransitionKind::Indicator,
            name: id.name().to_string(),
            from,
            to,
            price,
            timestamp,
        }
    }

    pub fn position(symbol: &str, from: Signal, to: Signal, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind: TransitionKind::Position,
            name: TransitionKind::Position.as_str().to_string(),
            from,
            to,
            price,
            timestamp,
        }
    }
}

/// A symbol dropped from a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub symbol: String,
    pub error: String,
}

/// Record of one scheduler pass over a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub run_id: Uuid,
    /// Offset of the first symbol in the cycle's watchlist snapshot
    pub batch_start: usize,
    /// Exclusive end offset
    pub batch_end: usize,
    /// Watchlist size for the cycle this batch belongs to
    pub total_symbols: usize,
    pub symbol_count: usize,
    pub success_count: usize,
    pub failures: Vec<BatchFailure>,
    pub transition_count: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl BatchRun {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// "1-15/37" style label used in logs
    pub fn range_label(&self) -> String {
        format!("{}-{}/{}", self.batch_start + 1, self.batch_end, self.total_symbols)
    }
}
