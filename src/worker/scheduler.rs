//! Batch scheduler
//!
//! Cycles the watchlist in fixed-size batches. Each batch fans out one task
//! per symbol and waits for all of them before touching any state:
//!
//! ```text
//! IDLE -> RUNNING(batch) -> COOLDOWN -> RUNNING(next batch) -> ... -> cycle done -> IDLE
//! ```
//!
//! Membership is snapshotted when a cycle starts, so edits to the watchlist
//! only take effect from the next cycle and batch boundaries stay stable.

use crate::error::{AppError, EvaluationError, Result};
use crate::models::{
    BatchFailure, BatchRun, IndicatorThresholds, MonitorConfig, SharedWatchlist, SymbolSnapshot, TransitionEvent,
};
use crate::services::evaluator::SymbolEvaluator;
use crate::services::sinks::{BatchRunSink, ChangeSink};
use crate::services::sources::{SnapshotSource, TimeSeriesSource};
use crate::services::state_store::StateStore;
use crate::services::state_tracker::{StateTracker, TrackOutcome};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
    Cooldown,
    Stopped,
}

/// Counters exposed through [`SchedulerHandle::stats`]
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub state: SchedulerState,
    pub batches_processed: u64,
    pub cycles_completed: u64,
    pub symbols_evaluated: u64,
    pub symbol_failures: u64,
    pub transitions_emitted: u64,
    pub store_failures: u64,
    pub cursor: usize,
    pub cycle_len: usize,
    pub last_batch: Option<BatchRun>,
}

/// Result of one call to [`BatchScheduler::process_next_batch`]
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Watchlist empty, nothing evaluated
    Idle,
    /// Data source reported itself unavailable, nothing evaluated
    Unavailable,
    Processed { run: BatchRun, cycle_complete: bool },
}

#[derive(Debug, Clone)]
enum SchedulerCommand {
    Configure {
        batch_size: usize,
        batch_cooldown: Duration,
        thresholds: IndicatorThresholds,
    },
}

pub struct BatchScheduler {
    watchlist: SharedWatchlist,
    store: Arc<dyn StateStore>,
    change_sinks: Vec<Arc<dyn ChangeSink>>,
    batch_sinks: Vec<Arc<dyn BatchRunSink>>,
    config: MonitorConfig,
    evaluator: SymbolEvaluator,
    tracker: StateTracker,
    /// Symbols of the current cycle
    cycle: Vec<String>,
    cursor: usize,
    /// Batch size queued by `configure`, taken up when the next cycle starts
    pending_batch_size: Option<usize>,
    stats: SchedulerStats,
    stats_tx: watch::Sender<SchedulerStats>,
    commands_tx: mpsc::UnboundedSender<SchedulerCommand>,
    commands_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
}

impl BatchScheduler {
    pub fn new(
        watchlist: SharedWatchlist,
        time_series: Arc<dyn TimeSeriesSource>,
        snapshots: Arc<dyn SnapshotSource>,
        store: Arc<dyn StateStore>,
        config: MonitorConfig,
    ) -> Self {
        let evaluator = SymbolEvaluator::new(time_series, snapshots, config.thresholds, config.fetch_timeout);
        let (stats_tx, _) = watch::channel(SchedulerStats::default());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Self {
            watchlist,
            store,
            change_sinks: Vec::new(),
            batch_sinks: Vec::new(),
            config,
            evaluator,
            tracker: StateTracker::new(),
            cycle: Vec::new(),
            cursor: 0,
            pending_batch_size: None,
            stats: SchedulerStats::default(),
            stats_tx,
            commands_tx,
            commands_rx,
        }
    }

    pub fn with_change_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.change_sinks.push(sink);
        self
    }

    pub fn with_batch_sink(mut self, sink: Arc<dyn BatchRunSink>) -> Self {
        self.batch_sinks.push(sink);
        self
    }

    /// Load remembered signal state from the store. Failure here is the one
    /// condition callers should treat as fatal.
    pub async fn restore_state(&mut self) -> Result<usize> {
        let persisted = self.store.load_all().await?;
        self.tracker = StateTracker::from_persisted(persisted);
        let symbols = self.tracker.symbol_count();
        info!(symbols, "Restored signal state");
        Ok(symbols)
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.clone()
    }

    /// Queue new settings. Cooldown and thresholds apply at the next batch
    /// boundary, batch size at the next cycle boundary.
    pub fn configure(&self, batch_size: usize, batch_cooldown: Duration, thresholds: IndicatorThresholds) -> Result<()> {
        send_configure(&self.commands_tx, batch_size, batch_cooldown, thresholds)
    }

    fn apply_pending_commands(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            match command {
                SchedulerCommand::Configure { batch_size, batch_cooldown, thresholds } => {
                    self.pending_batch_size = Some(batch_size);
                    self.config.batch_cooldown = batch_cooldown;
                    self.config.thresholds = thresholds;
                    self.evaluator = self.evaluator.clone().with_thresholds(thresholds);
                    info!(
                        batch_size,
                        cooldown_ms = batch_cooldown.as_millis() as u64,
                        rsi_period = thresholds.rsi_period,
                        "Scheduler reconfigured"
                    );
                }
            }
        }
    }

    fn publish_stats(&mut self, state: SchedulerState) {
        self.stats.state = state;
        self.stats.cursor = self.cursor;
        self.stats_tx.send_replace(self.stats.clone());
    }

    /// Run exactly one batch: evaluate, track, persist, deliver, advance
    pub async fn process_next_batch(&mut self) -> BatchOutcome {
        self.apply_pending_commands();

        if self.cursor == 0 {
            if let Some(batch_size) = self.pending_batch_size.take() {
                self.config.batch_size = batch_size;
            }
            self.cycle = self.watchlist.read().await.symbols();
            self.stats.cycle_len = self.cycle.len();
            if !self.cycle.is_empty() {
                debug!(symbols = self.cycle.len(), "Starting cycle");
            }
        }

        if self.cycle.is_empty() {
            self.publish_stats(SchedulerState::Idle);
            return BatchOutcome::Idle;
        }
        if !self.evaluator.sources_available() {
            self.publish_stats(SchedulerState::Idle);
            return BatchOutcome::Unavailable;
        }

        self.publish_stats(SchedulerState::Running);

        let total_symbols = self.cycle.len();
        let batch_start = self.cursor;
        let batch_end = (batch_start + self.config.batch_size).min(total_symbols);
        let symbols = self.cycle[batch_start..batch_end].to_vec();
        let started_at = Utc::now();
        let timer = Instant::now();

        // Fan out, then wait for every symbol
        let tasks: Vec<_> = symbols
            .iter()
            .map(|symbol| {
                let evaluator = self.evaluator.clone();
                let symbol = symbol.clone();
                tokio::spawn(async move { evaluator.evaluate(&symbol).await })
            })
            .collect();
        let results = join_all(tasks).await;

        // Post-barrier: single writer for tracker state
        let mut transitions: Vec<TransitionEvent> = Vec::new();
        let mut failures: Vec<BatchFailure> = Vec::new();
        let mut success_count = 0;

        for (symbol, joined) in symbols.iter().zip(results) {
            let result = joined.unwrap_or_else(|e| {
                Err(EvaluationError::TaskFailed {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                })
            });

            match result {
                Ok(snapshot) => {
                    success_count += 1;
                    let outcome = self.tracker.track(&snapshot);
                    self.persist(&snapshot, &outcome).await;
                    transitions.extend(outcome.transitions);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Symbol evaluation failed");
                    failures.push(BatchFailure {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !transitions.is_empty() {
            for sink in &self.change_sinks {
                if let Err(e) = sink.accept(&transitions).await {
                    warn!(error = %e, events = transitions.len(), "Change sink rejected transitions");
                }
            }
        }

        let run = BatchRun {
            run_id: Uuid::new_v4(),
            batch_start,
            batch_end,
            total_symbols,
            symbol_count: symbols.len(),
            success_count,
            failures,
            transition_count: transitions.len(),
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
        };

        for sink in &self.batch_sinks {
            if let Err(e) = sink.accept(&run).await {
                warn!(error = %e, run_id = %run.run_id, "Batch run sink rejected record");
            }
        }

        self.cursor = batch_end;
        let cycle_complete = self.cursor >= total_symbols;
        if cycle_complete {
            self.cursor = 0;
            self.stats.cycles_completed += 1;
            info!(
                cycle = self.stats.cycles_completed,
                symbols = total_symbols,
                "Cycle complete, restarting from the first symbol"
            );
        }

        self.stats.batches_processed += 1;
        self.stats.symbols_evaluated += run.success_count as u64;
        self.stats.symbol_failures += run.failure_count() as u64;
        self.stats.transitions_emitted += run.transition_count as u64;
        self.stats.last_batch = Some(run.clone());
        self.publish_stats(SchedulerState::Cooldown);

        BatchOutcome::Processed { run, cycle_complete }
    }

    /// Write back what the tracker changed. Store errors are logged and the
    /// in-memory state is kept.
    async fn persist(&mut self, snapshot: &SymbolSnapshot, outcome: &TrackOutcome) {
        for (indicator, state) in &outcome.indicator_updates {
            if let Err(e) = self.store.save(&snapshot.symbol, *indicator, *state).await {
                self.stats.store_failures += 1;
                warn!(symbol = %snapshot.symbol, indicator = indicator.name(), error = %e, "Failed to persist indicator state");
            }
        }
        if let Some(position) = outcome.position_update {
            if let Err(e) = self.store.save_position(&snapshot.symbol, position).await {
                self.stats.store_failures += 1;
                warn!(symbol = %snapshot.symbol, error = %e, "Failed to persist position");
            }
        }
    }

    fn pause_after(&self, outcome: &BatchOutcome) -> Duration {
        match outcome {
            BatchOutcome::Idle => self.config.idle_retry,
            BatchOutcome::Unavailable => self.config.error_retry,
            BatchOutcome::Processed { cycle_complete: true, .. } => self.config.cycle_pause,
            BatchOutcome::Processed { .. } => self.config.batch_cooldown,
        }
    }

    /// Loop until `shutdown` turns true. The batch in flight always finishes;
    /// sleeps are cut short.
    #[instrument(skip_all, name = "batch_scheduler")]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.config.batch_size,
            cooldown_ms = self.config.batch_cooldown.as_millis() as u64,
            fetch_timeout_secs = self.config.fetch_timeout.as_secs(),
            "Starting batch scheduler"
        );

        let mut iteration_count = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }
            iteration_count += 1;
            let loop_start = Instant::now();

            let outcome = self.process_next_batch().await;
            let pause = self.pause_after(&outcome);

            match &outcome {
                BatchOutcome::Idle => {
                    debug!(iteration = iteration_count, retry_secs = pause.as_secs(), "Watchlist empty");
                }
                BatchOutcome::Unavailable => {
                    warn!(iteration = iteration_count, retry_secs = pause.as_secs(), "Data source unavailable");
                }
                BatchOutcome::Processed { run, .. } => {
                    debug!(
                        iteration = iteration_count,
                        range = %run.range_label(),
                        succeeded = run.success_count,
                        failed = run.failure_count(),
                        transitions = run.transition_count,
                        loop_duration_secs = loop_start.elapsed().as_secs_f64(),
                        "Batch processed"
                    );
                }
            }

            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Every handle dropped: nobody can stop us later
                        break;
                    }
                }
            }
        }

        self.publish_stats(SchedulerState::Stopped);
        info!(iterations = iteration_count, "Batch scheduler stopped");
    }

    /// Spawn the loop and return a handle to control it
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let commands = self.commands_tx.clone();
        let stats = self.stats_tx.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));

        SchedulerHandle {
            shutdown: shutdown_tx,
            commands,
            stats,
            task,
        }
    }
}

fn send_configure(
    commands: &mpsc::UnboundedSender<SchedulerCommand>,
    batch_size: usize,
    batch_cooldown: Duration,
    thresholds: IndicatorThresholds,
) -> Result<()> {
    if batch_size == 0 {
        return Err(AppError::InvalidInput("batch size must be at least 1".to_string()));
    }
    thresholds.validate()?;
    commands
        .send(SchedulerCommand::Configure { batch_size, batch_cooldown, thresholds })
        .map_err(|_| AppError::Other("scheduler is no longer running".to_string()))
}

/// Control surface of a running scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    stats: watch::Receiver<SchedulerStats>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stats(&self) -> SchedulerStats {
        self.stats.borrow().clone()
    }

    pub fn configure(&self, batch_size: usize, batch_cooldown: Duration, thresholds: IndicatorThresholds) -> Result<()> {
        send_configure(&self.commands, batch_size, batch_cooldown, thresholds)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait for the batch in flight to finish
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|e| {
            error!(error = %e, "Scheduler task ended abnormally");
            AppError::Other(format!("scheduler task failed: {}", e))
        })
    }
}
