use crate::error::Result;
use crate::models::{BatchRun, TransitionEvent};
use async_trait::async_trait;
use tracing::info;

/// Receives the transitions of one batch, once
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn accept(&self, events: &[TransitionEvent]) -> Result<()>;
}

/// Receives one record per processed batch
#[async_trait]
pub trait BatchRunSink: Send + Sync {
    async fn accept(&self, run: &BatchRun) -> Result<()>;
}

/// Logs transitions and batch runs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl ChangeSink for TracingSink {
    async fn accept(&self, events: &[TransitionEvent]) -> Result<()> {
        for event in events {
            info!(
                symbol = %event.symbol,
                kind = event.kind.as_str(),
                name = %event.name,
                from = %event.from,
                to = %event.to,
                price = event.price,
                "Signal transition"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl BatchRunSink for TracingSink {
    async fn accept(&self, run: &BatchRun) -> Result<()> {
        info!(
            run_id = %run.run_id,
            range = %run.range_label(),
            succeeded = run.success_count,
            failed = run.failure_count(),
            transitions = run.transition_count,
            duration_ms = run.duration_ms,
            "Batch complete"
        );
        Ok(())
    }
}
