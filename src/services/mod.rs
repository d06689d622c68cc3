pub mod classifier;
pub mod csv_source;
pub mod evaluator;
pub mod indicator_engine;
pub mod polygon;
pub mod rate_limiter;
pub mod sinks;
pub mod sources;
pub mod state_store;
pub mod state_tracker;
pub mod subscribers;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::SignalClassifier;
pub use csv_source::CsvSource;
pub use evaluator::SymbolEvaluator;
pub use indicator_engine::IndicatorEngine;
pub use polygon::{MarketType, PolygonClient};
pub use rate_limiter::SharedRateLimiter;
pub use sinks::{BatchRunSink, ChangeSink, TracingSink};
pub use sources::{SnapshotSource, TimeSeriesSource};
pub use state_store::{PersistedState, PositionRow, SqliteStateStore, StateStore};
pub use state_tracker::{StateTracker, TrackOutcome};
pub use subscribers::{SubscriberId, SubscriberRegistry, TransitionBatch};
