use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser)]
#[command(name = "signalwatch")]
#[command(about = "Multi-timeframe indicator signal monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where price data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Polygon-compatible REST API (needs POLYGON_API_KEY)
    Polygon,
    /// CSV files under MARKET_DATA_DIR
    Csv,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Market data source
    #[arg(long, value_enum, default_value_t = SourceKind::Polygon)]
    pub source: SourceKind,

    /// Symbols evaluated concurrently per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pause between batches in milliseconds
    #[arg(long)]
    pub cooldown_ms: Option<u64>,

    /// Use RSI(14) with 30/70 bands instead of RSI(9) with 20/80
    #[arg(long)]
    pub legacy_rsi: bool,

    /// Print every transition batch to stdout as JSON lines
    #[arg(long)]
    pub json_events: bool,

    /// Watchlist file (defaults to WATCHLIST_FILE or watchlist.json)
    #[arg(long)]
    pub watchlist: Option<PathBuf>,

    /// State database (defaults to DATABASE_PATH or signalwatch.db)
    #[arg(long)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the monitor until Ctrl-C
    Run(RunArgs),
    /// Evaluate one symbol now and print the snapshot as JSON
    Evaluate {
        symbol: String,

        #[arg(long, value_enum, default_value_t = SourceKind::Polygon)]
        source: SourceKind,

        #[arg(long)]
        legacy_rsi: bool,
    },
    /// Show stored positions, recent transitions and batch runs
    Status {
        /// Number of recent transitions and batch runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Edit the watchlist file
    Watch {
        #[command(subcommand)]
        action: WatchAction,

        #[arg(long, global = true)]
        watchlist: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum WatchAction {
    /// Add symbols
    Add { symbols: Vec<String> },
    /// Remove symbols
    Remove { symbols: Vec<String> },
    /// List watched symbols
    List,
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            commands::run::run(args).await;
        }
        Commands::Evaluate { symbol, source, legacy_rsi } => {
            commands::evaluate::run(symbol, source, legacy_rsi).await;
        }
        Commands::Status { limit, database } => {
            commands::status::run(limit, database).await;
        }
        Commands::Watch { action, watchlist } => {
            commands::watch::run(action, watchlist);
        }
    }
}
