//! In-memory collaborators for unit tests

use crate::error::{AppError, Result};
use crate::models::{BatchRun, IndicatorId, Ohlcv, PriceSeries, PriceSnapshot, Signal, Timeframe, TransitionEvent};
use crate::services::sinks::{BatchRunSink, ChangeSink};
use crate::services::sources::{SnapshotSource, TimeSeriesSource};
use crate::services::state_store::{PersistedState, StateStore};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Canned prices and closes per symbol
#[derive(Debug, Default)]
pub struct FakeMarket {
    prices: Mutex<HashMap<String, f64>>,
    series: Mutex<HashMap<(String, Timeframe), Vec<f64>>>,
    stalled: HashSet<String>,
    failing: HashSet<String>,
    unavailable: AtomicBool,
    pub series_calls: AtomicUsize,
}

impl FakeMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn with_series(self, symbol: &str, timeframe: Timeframe, closes: Vec<f64>) -> Self {
        self.set_series(symbol, timeframe, closes);
        self
    }

    /// Daily series fetches for `symbol` never complete
    pub fn stall(mut self, symbol: &str) -> Self {
        self.stalled.insert(symbol.to_string());
        self
    }

    /// Series fetches for `symbol` return an error
    pub fn fail(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn set_series(&self, symbol: &str, timeframe: Timeframe, closes: Vec<f64>) {
        self.series
            .lock()
            .unwrap()
            .insert((symbol.to_string(), timeframe), closes);
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimeSeriesSource for FakeMarket {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, _lookback: Duration) -> Result<PriceSeries> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.contains(symbol) && timeframe == Timeframe::Daily {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(symbol) {
            return Err(AppError::Network(format!("{} refused", symbol)));
        }

        let closes = self
            .series
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Ohlcv::new(start + Duration::hours(i as i64), c, c, c, c, 1.0))
            .collect();
        Ok(PriceSeries::new(symbol, timeframe, bars))
    }

    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeMarket {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<PriceSnapshot> {
        let price = self
            .prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| AppError::DataUnavailable(format!("no price for {}", symbol)))?;
        Ok(PriceSnapshot { price, timestamp: Utc::now() })
    }

    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

/// State store kept in memory, optionally rejecting every write
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub state: Mutex<PersistedState>,
    pub fail_writes: AtomicBool,
    pub fail_load: bool,
}

impl MemoryStore {
    pub fn indicator(&self, symbol: &str, id: IndicatorId) -> Option<Signal> {
        self.state
            .lock()
            .unwrap()
            .indicator_states
            .get(symbol)
            .and_then(|m| m.get(&id))
            .copied()
    }

    pub fn position(&self, symbol: &str) -> Option<Signal> {
        self.state.lock().unwrap().position_states.get(symbol).copied()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_all(&self) -> Result<PersistedState> {
        if self.fail_load {
            return Err(AppError::Database("database is locked".to_string()));
        }
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, symbol: &str, indicator: IndicatorId, state: Signal) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("disk full".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .indicator_states
            .entry(symbol.to_string())
            .or_default()
            .insert(indicator, state);
        Ok(())
    }

    async fn save_position(&self, symbol: &str, state: Signal) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("disk full".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .position_states
            .insert(symbol.to_string(), state);
        Ok(())
    }
}

/// Records everything handed to it
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<TransitionEvent>>>,
    pub runs: Mutex<Vec<BatchRun>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn runs(&self) -> Vec<BatchRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeSink for RecordingSink {
    async fn accept(&self, events: &[TransitionEvent]) -> Result<()> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

#[async_trait]
impl BatchRunSink for RecordingSink {
    async fn accept(&self, run: &BatchRun) -> Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }
}
