use crate::cli::SourceKind;
use crate::commands::build_sources;
use crate::error::{AppError, Result};
use crate::models::{IndicatorThresholds, MonitorConfig};
use crate::services::SymbolEvaluator;

pub async fn run(symbol: String, source: SourceKind, legacy_rsi: bool) {
    if let Err(e) = evaluate(&symbol, source, legacy_rsi).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn evaluate(symbol: &str, source: SourceKind, legacy_rsi: bool) -> Result<()> {
    let mut config = MonitorConfig::from_env()?;
    if legacy_rsi {
        config.thresholds = IndicatorThresholds::legacy();
    }

    let (time_series, snapshots) = build_sources(source, &config)?;
    let evaluator = SymbolEvaluator::new(time_series, snapshots, config.thresholds, config.fetch_timeout);
    if !evaluator.sources_available() {
        return Err(AppError::DataUnavailable("market data source is not available".to_string()));
    }

    let symbol = symbol.trim().to_uppercase();
    let snapshot = evaluator
        .evaluate(&symbol)
        .await
        .map_err(|e| AppError::DataUnavailable(e.to_string()))?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    eprintln!(
        "📊 {} @ {:.4}: {} ({} buy / {} sell of {} indicators)",
        snapshot.symbol,
        snapshot.price,
        snapshot.position(),
        snapshot.buy_signals.len(),
        snapshot.sell_signals.len(),
        snapshot.indicators.len()
    );
    Ok(())
}
