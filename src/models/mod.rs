mod events;
mod monitor_config;
mod ohlcv;
mod signal;
mod snapshot;
mod timeframe;
mod watchlist;
pub mod indicators;

pub use events::{BatchFailure, BatchRun, TransitionEvent, TransitionKind};
pub use monitor_config::{IndicatorThresholds, MonitorConfig};
pub use ohlcv::{Ohlcv, PriceSeries};
pub use signal::{IndicatorId, IndicatorResult, IndicatorValue, Signal};
pub use snapshot::{aggregate_position, PriceSnapshot, SymbolSnapshot};
pub use timeframe::Timeframe;
pub use watchlist::{SharedWatchlist, SymbolMeta, Watchlist};
