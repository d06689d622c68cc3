//! Monitor Constants
//!
//! Default scheduling cadence, provider lookbacks and indicator parameters.
//!
//! ## Scheduling
//!
//! | Setting              | Default | Purpose                                   |
//! |----------------------|---------|-------------------------------------------|
//! | Batch size           | 15      | Symbols evaluated concurrently            |
//! | Batch cooldown       | 500ms   | Throttle between batches (API limits)     |
//! | Cycle pause          | 500ms   | Pause after a full pass of the watchlist  |
//! | Idle retry           | 5s      | Watchlist empty                           |
//! | Error retry          | 10s     | Data source unavailable                   |
//! | Fetch timeout        | 20s     | Per external call                         |

/// Number of symbols evaluated concurrently in one batch
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// Sleep between two batches of the same cycle
pub const DEFAULT_BATCH_COOLDOWN_MS: u64 = 500;

/// Sleep after the last batch of a cycle before restarting at offset 0
pub const DEFAULT_CYCLE_PAUSE_MS: u64 = 500;

/// Sleep when the watchlist is empty
pub const DEFAULT_IDLE_RETRY_SECS: u64 = 5;

/// Sleep when the data source reports itself unavailable
pub const DEFAULT_ERROR_RETRY_SECS: u64 = 10;

/// Upper bound on any single external fetch
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// Provider request budget shared by every concurrent task
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 300;

/// Daily bars requested (EMA 200 needs 200+)
pub const DAILY_LOOKBACK_DAYS: i64 = 250;

/// Hourly history requested in days (EMA 100 needs 100+ bars)
pub const HOURLY_LOOKBACK_DAYS: i64 = 30;

/// Weekly bars requested (Bollinger 20 and EMA 20 need 20+)
pub const WEEKLY_LOOKBACK_WEEKS: i64 = 30;

/// RSI defaults for the daily catalogue entry
pub const RSI_PERIOD: usize = 9;
pub const RSI_OVERSOLD: f64 = 20.0;
pub const RSI_OVERBOUGHT: f64 = 80.0;

/// Older RSI variant (14 period, 30/70 bands), selectable with `--legacy-rsi`
pub const LEGACY_RSI_PERIOD: usize = 14;
pub const LEGACY_RSI_OVERSOLD: f64 = 30.0;
pub const LEGACY_RSI_OVERBOUGHT: f64 = 70.0;

/// Bollinger Bands: EMA middle band, k standard deviations
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;

/// MACD (fast, slow, signal)
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Dual EMA crossover (fast, slow)
pub const CROSSOVER_FAST: usize = 9;
pub const CROSSOVER_SLOW: usize = 21;

/// Per-timeframe EMA periods
pub const DAILY_EMA_PERIODS: &[usize] = &[9, 20, 50, 200];
pub const HOURLY_EMA_PERIOD: usize = 100;
pub const WEEKLY_EMA_PERIOD: usize = 20;

/// Capacity of each push subscriber's queue (in batches)
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;
