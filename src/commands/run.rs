use crate::cli::RunArgs;
use crate::commands::build_sources;
use crate::error::Result;
use crate::models::{IndicatorThresholds, MonitorConfig, Watchlist};
use crate::services::{SqliteStateStore, SubscriberRegistry, TracingSink};
use crate::utils::{get_database_path, get_watchlist_path};
use crate::worker::BatchScheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn run(args: RunArgs) {
    if let Err(e) = run_monitor(args).await {
        error!(error = %e, "Monitor failed");
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_monitor(args: RunArgs) -> Result<()> {
    let mut config = MonitorConfig::from_env()?;
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(cooldown_ms) = args.cooldown_ms {
        config.batch_cooldown = Duration::from_millis(cooldown_ms);
    }
    if args.legacy_rsi {
        config.thresholds = IndicatorThresholds::legacy();
    }
    config.validate()?;

    let watchlist_path = args.watchlist.unwrap_or_else(get_watchlist_path);
    let watchlist = if watchlist_path.exists() {
        Watchlist::from_file(&watchlist_path)?
    } else {
        warn!(path = %watchlist_path.display(), "Watchlist file not found, starting empty");
        Watchlist::new()
    };
    info!(path = %watchlist_path.display(), symbols = watchlist.len(), "Watchlist loaded");

    let (time_series, snapshots) = build_sources(args.source, &config)?;
    let store = Arc::new(SqliteStateStore::new(args.database.unwrap_or_else(get_database_path)).await?);
    let subscribers = Arc::new(SubscriberRegistry::new());

    let mut scheduler = BatchScheduler::new(
        watchlist.into_shared(),
        time_series,
        snapshots,
        store.clone(),
        config,
    )
    .with_change_sink(Arc::new(TracingSink))
    .with_change_sink(store.clone())
    .with_change_sink(subscribers.clone())
    .with_batch_sink(Arc::new(TracingSink))
    .with_batch_sink(store.clone());

    // The only fatal startup condition
    scheduler.restore_state().await?;

    if args.json_events {
        let (_id, mut events) = subscribers.subscribe_default().await;
        tokio::spawn(async move {
            while let Some(batch) = events.recv().await {
                for event in batch.iter() {
                    match serde_json::to_string(event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!(error = %e, "Failed to encode transition"),
                    }
                }
            }
        });
    }

    let handle = scheduler.start();
    info!("Monitor running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, finishing current batch");

    let stats = handle.stats();
    handle.stop().await?;
    store.close().await;

    info!(
        batches = stats.batches_processed,
        cycles = stats.cycles_completed,
        transitions = stats.transitions_emitted,
        "Monitor stopped"
    );
    Ok(())
}
