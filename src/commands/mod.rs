pub mod evaluate;
pub mod run;
pub mod status;
pub mod watch;

use crate::cli::SourceKind;
use crate::error::{AppError, Result};
use crate::models::MonitorConfig;
use crate::services::{CsvSource, PolygonClient, SnapshotSource, TimeSeriesSource};
use crate::utils::get_market_data_dir;
use std::sync::Arc;

/// Build the price and snapshot sources for the chosen provider
pub(crate) fn build_sources(
    kind: SourceKind,
    config: &MonitorConfig,
) -> Result<(Arc<dyn TimeSeriesSource>, Arc<dyn SnapshotSource>)> {
    match kind {
        SourceKind::Polygon => {
            let client = Arc::new(PolygonClient::from_env(config.rate_limit_per_minute, config.fetch_timeout)?);
            let time_series: Arc<dyn TimeSeriesSource> = client.clone();
            let snapshots: Arc<dyn SnapshotSource> = client;
            Ok((time_series, snapshots))
        }
        SourceKind::Csv => {
            let data_dir = get_market_data_dir();
            if !data_dir.is_dir() {
                return Err(AppError::Config(format!(
                    "market data directory {} does not exist",
                    data_dir.display()
                )));
            }
            let source = Arc::new(CsvSource::new(data_dir));
            let time_series: Arc<dyn TimeSeriesSource> = source.clone();
            let snapshots: Arc<dyn SnapshotSource> = source;
            Ok((time_series, snapshots))
        }
    }
}
