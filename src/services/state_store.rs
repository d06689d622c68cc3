//! Durable signal state
//!
//! The [`StateStore`] trait is read once at startup and written incrementally
//! after every batch. [`SqliteStateStore`] backs it with SQLite and also keeps
//! the append-only transition history and batch audit trail.

use crate::error::{AppError, Result};
use crate::models::{BatchFailure, BatchRun, IndicatorId, Signal, TransitionEvent};
use crate::services::sinks::{BatchRunSink, ChangeSink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything the tracker needs to resume after a restart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    /// symbol -> indicator -> last classification
    pub indicator_states: HashMap<String, HashMap<IndicatorId, Signal>>,
    /// symbol -> last aggregate position
    pub position_states: HashMap<String, Signal>,
}

impl PersistedState {
    pub fn symbol_count(&self) -> usize {
        self.indicator_states
            .keys()
            .chain(self.position_states.keys())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_all(&self) -> Result<PersistedState>;

    async fn save(&self, symbol: &str, indicator: IndicatorId, state: Signal) -> Result<()>;

    async fn save_position(&self, symbol: &str, state: Signal) -> Result<()>;
}

/// Stored position row, used by `status`
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub symbol: String,
    pub position: Signal,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed state store
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
    database_path: PathBuf,
}

impl SqliteStateStore {
    /// Open (or create) the database and make sure the schema exists
    pub async fn new(database_path: impl AsRef<Path>) -> Result<Self> {
        let database_path = database_path.as_ref().to_path_buf();
        info!(path = %database_path.display(), "Opening state database");

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(connect_options).await?;
        let store = Self { pool, database_path };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }

    async fn initialize_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS indicator_states (
                symbol TEXT NOT NULL,
                indicator TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at DATETIME NOT NULL,
                PRIMARY KEY (symbol, indicator)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS position_states (
                symbol TEXT PRIMARY KEY,
                position TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                from_state TEXT NOT NULL,
                to_state TEXT NOT NULL,
                price REAL NOT NULL,
                timestamp DATETIME NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_transitions_symbol_time ON transitions(symbol, timestamp DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS batch_runs (
                run_id TEXT PRIMARY KEY,
                batch_start INTEGER NOT NULL,
                batch_end INTEGER NOT NULL,
                total_symbols INTEGER NOT NULL,
                symbol_count INTEGER NOT NULL,
                success_count INTEGER NOT NULL,
                failure_count INTEGER NOT NULL,
                failures TEXT NOT NULL,
                transition_count INTEGER NOT NULL,
                started_at DATETIME NOT NULL,
                duration_ms INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_batch_runs_started ON batch_runs(started_at DESC)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Stored positions, alphabetically
    pub async fn positions(&self) -> Result<Vec<PositionRow>> {
        let rows = sqlx::query("SELECT symbol, position, updated_at FROM position_states ORDER BY symbol")
            .fetch_all(&self.pool)
            .await?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            let symbol: String = row.try_get("symbol")?;
            let raw: String = row.try_get("position")?;
            match Signal::from_str(&raw) {
                Ok(position) => positions.push(PositionRow {
                    symbol,
                    position,
                    updated_at: row.try_get("updated_at")?,
                }),
                Err(e) => warn!(symbol = %symbol, error = %e, "Skipping stored position"),
            }
        }
        Ok(positions)
    }

    /// Most recent transitions, newest first
    pub async fn recent_transitions(&self, limit: usize) -> Result<Vec<TransitionEvent>> {
        let rows = sqlx::query(
            "SELECT symbol, kind, name, from_state, to_state, price, timestamp
             FROM transitions ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transition).collect()
    }

    /// Most recent batch runs, newest first
    pub async fn recent_batch_runs(&self, limit: usize) -> Result<Vec<BatchRun>> {
        let rows = sqlx::query(
            "SELECT run_id, batch_start, batch_end, total_symbols, symbol_count, success_count,
                    failures, transition_count, started_at, duration_ms
             FROM batch_runs ORDER BY started_at DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_batch_run).collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load_all(&self) -> Result<PersistedState> {
        let mut state = PersistedState::default();

        let rows = sqlx::query("SELECT symbol, indicator, state FROM indicator_states")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let symbol: String = row.try_get("symbol")?;
            let indicator: String = row.try_get("indicator")?;
            let raw: String = row.try_get("state")?;

            let Some(id) = IndicatorId::from_name(&indicator) else {
                warn!(symbol = %symbol, indicator = %indicator, "Unknown indicator in store, skipping");
                continue;
            };
            match Signal::from_str(&raw) {
                Ok(signal) => {
                    state.indicator_states.entry(symbol).or_default().insert(id, signal);
                }
                Err(e) => warn!(symbol = %symbol, indicator = %indicator, error = %e, "Bad stored state, skipping"),
            }
        }

        let rows = sqlx::query("SELECT symbol, position FROM position_states")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let symbol: String = row.try_get("symbol")?;
            let raw: String = row.try_get("position")?;
            match Signal::from_str(&raw) {
                Ok(signal) => {
                    state.position_states.insert(symbol, signal);
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "Bad stored position, skipping"),
            }
        }

        info!(symbols = state.symbol_count(), "Loaded persisted signal state");
        Ok(state)
    }

    async fn save(&self, symbol: &str, indicator: IndicatorId, state: Signal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indicator_states (symbol, indicator, state, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(symbol, indicator) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(symbol)
        .bind(indicator.name())
        .bind(state.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_position(&self, symbol: &str, state: Signal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO position_states (symbol, position, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(symbol) DO UPDATE SET
                position = excluded.position,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(symbol)
        .bind(state.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChangeSink for SqliteStateStore {
    async fn accept(&self, events: &[TransitionEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut transaction = self.pool.begin().await?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO transitions (symbol, kind, name, from_state, to_state, price, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&event.symbol)
            .bind(event.kind.as_str())
            .bind(&event.name)
            .bind(event.from.as_str())
            .bind(event.to.as_str())
            .bind(event.price)
            .bind(event.timestamp)
            .execute(&mut *transaction)
            .await?;
        }
        transaction.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl BatchRunSink for SqliteStateStore {
    async fn accept(&self, run: &BatchRun) -> Result<()> {
        let failures = serde_json::to_string(&run.failures)?;
        sqlx::query(
            r#"
            INSERT INTO batch_runs (
                run_id, batch_start, batch_end, total_symbols, symbol_count, success_count,
                failure_count, failures, transition_count, started_at, duration_ms
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(run.batch_start as i64)
        .bind(run.batch_end as i64)
        .bind(run.total_symbols as i64)
        .bind(run.symbol_count as i64)
        .bind(run.success_count as i64)
        .bind(run.failure_count() as i64)
        .bind(failures)
        .bind(run.transition_count as i64)
        .bind(run.started_at)
        .bind(run.duration_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_transition(row: &SqliteRow) -> Result<TransitionEvent> {
    let kind: String = row.try_get("kind")?;
    let from: String = row.try_get("from_state")?;
    let to: String = row.try_get("to_state")?;

    Ok(TransitionEvent {
        symbol: row.try_get("symbol")?,
        kind: serde_json::from_value(serde_json::Value::String(kind))?,
        name: row.try_get("name")?,
        from: Signal::from_str(&from).map_err(AppError::Parse)?,
        to: Signal::from_str(&to).map_err(AppError::Parse)?,
        price: row.try_get("price")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn row_to_batch_run(row: &SqliteRow) -> Result<BatchRun> {
    let run_id: String = row.try_get("run_id")?;
    let failures: String = row.try_get("failures")?;
    let failures: Vec<BatchFailure> = serde_json::from_str(&failures)?;

    Ok(BatchRun {
        run_id: Uuid::parse_str(&run_id).map_err(|e| AppError::Parse(e.to_string()))?,
        batch_start: row.try_get::<i64, _>("batch_start")? as usize,
        batch_end: row.try_get::<i64, _>("batch_end")? as usize,
        total_symbols: row.try_get::<i64, _>("total_symbols")? as usize,
        symbol_count: row.try_get::<i64, _>("symbol_count")? as usize,
        success_count: row.try_get::<i64, _>("success_count")? as usize,
        failures,
        transition_count: row.try_get::<i64, _>("transition_count")? as usize,
        started_at: row.try_get("started_at")?,
        duration_ms: row.try_get::<i64, _>("duration_ms")? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransitionKind;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteStateStore {
        SqliteStateStore::new(dir.path().join("state.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_reload_state() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.save("AAPL", IndicatorId::Rsi9Daily, Signal::Buy).await.unwrap();
        store.save("AAPL", IndicatorId::Rsi9Daily, Signal::Sell).await.unwrap();
        store.save("AAPL", IndicatorId::MacdDaily, Signal::Buy).await.unwrap();
        store.save_position("AAPL", Signal::Neutral).await.unwrap();
        store.save_position("X:BTCUSD", Signal::Buy).await.unwrap();
        store.close().await;

        let store = open_store(&dir).await;
        let state = store.load_all().await.unwrap();

        let aapl = &state.indicator_states["AAPL"];
        assert_eq!(aapl[&IndicatorId::Rsi9Daily], Signal::Sell);
        assert_eq!(aapl[&IndicatorId::MacdDaily], Signal::Buy);
        assert_eq!(state.position_states["X:BTCUSD"], Signal::Buy);
        assert_eq!(state.symbol_count(), 2);

        let positions = store.positions().await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_unknown_indicator_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        sqlx::query("INSERT INTO indicator_states VALUES ('AAPL', 'SMA_5_Minute', 'BUY', ?1)")
            .bind(Utc::now())
            .execute(&store.pool)
            .await
            .unwrap();
        store.save("AAPL", IndicatorId::Ema9Daily, Signal::Sell).await.unwrap();

        let state = store.load_all().await.unwrap();
        assert_eq!(state.indicator_states["AAPL"].len(), 1);
    }

    #[tokio::test]
    async fn test_transition_history_and_batch_runs() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();

        let events = vec![
            TransitionEvent::indicator("AAPL", IndicatorId::Rsi9Daily, Signal::Neutral, Signal::Buy, 150.0, now),
            TransitionEvent::position("AAPL", Signal::Neutral, Signal::Buy, 150.0, now),
        ];
        ChangeSink::accept(&store, &events).await.unwrap();

        let history = store.recent_transitions(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransitionKind::Position);
        assert_eq!(history[1].name, "RSI_9_Daily");

        let run = BatchRun {
            run_id: Uuid::new_v4(),
            batch_start: 15,
            batch_end: 30,
            total_symbols: 37,
            symbol_count: 15,
            success_count: 14,
            failures: vec![BatchFailure { symbol: "TSLA".into(), error: "timed out".into() }],
            transition_count: 2,
            started_at: now,
            duration_ms: 812,
        };
        BatchRunSink::accept(&store, &run).await.unwrap();

        let runs = store.recent_batch_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run.run_id);
        assert_eq!(runs[0].failures, run.failures);
        assert_eq!(runs[0].range_label(), "16-30/37");
    }
}
