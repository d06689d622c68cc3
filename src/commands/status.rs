use crate::error::Result;
use crate::models::Signal;
use crate::services::SqliteStateStore;
use crate::utils::get_database_path;
use std::path::PathBuf;

pub async fn run(limit: usize, database: Option<PathBuf>) {
    println!("📊 Signal Monitor Status\n");

    if let Err(e) = show_status(limit, database).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn show_status(limit: usize, database: Option<PathBuf>) -> Result<()> {
    let path = database.unwrap_or_else(get_database_path);
    if !path.exists() {
        println!("⚠️  No state database at {}. Run 'run' first.", path.display());
        return Ok(());
    }

    let store = SqliteStateStore::new(&path).await?;

    let positions = store.positions().await?;
    let count = |wanted: Signal| positions.iter().filter(|p| p.position == wanted).count();
    println!(
        "📈 Positions: {} symbols ({} BUY, {} SELL, {} NEUTRAL)\n",
        positions.len(),
        count(Signal::Buy),
        count(Signal::Sell),
        count(Signal::Neutral)
    );
    for row in positions.iter().filter(|p| p.position != Signal::Neutral) {
        println!(
            "   {:<14} {:<8} since {}",
            row.symbol,
            row.position,
            row.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\n═══════════════════════════════════════════════════════════\n");
    println!("🔔 Recent transitions:");
    let transitions = store.recent_transitions(limit).await?;
    if transitions.is_empty() {
        println!("   (none)");
    }
    for event in &transitions {
        println!(
            "   {} {:<14} {:<22} {} -> {} @ {:.4}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.symbol,
            event.name,
            event.from,
            event.to,
            event.price
        );
    }

    println!("\n═══════════════════════════════════════════════════════════\n");
    println!("⏱️  Recent batches:");
    let runs = store.recent_batch_runs(limit).await?;
    if runs.is_empty() {
        println!("   (none)");
    }
    for run in &runs {
        println!(
            "   {} {:<12} ok={:<3} failed={:<3} transitions={:<4} {}ms",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.range_label(),
            run.success_count,
            run.failure_count(),
            run.transition_count,
            run.duration_ms
        );
        for failure in &run.failures {
            println!("      ✗ {}: {}", failure.symbol, failure.error);
        }
    }

    store.close().await;
    Ok(())
}
