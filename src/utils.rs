use std::path::PathBuf;

/// Get market data directory (CSV source) from environment variable or use default
pub fn get_market_data_dir() -> PathBuf {
    std::env::var("MARKET_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("market_data"))
}

/// Get SQLite state database path from environment variable or use default
pub fn get_database_path() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("signalwatch.db"))
}

/// Get watchlist file path from environment variable or use default
pub fn get_watchlist_path() -> PathBuf {
    std::env::var("WATCHLIST_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("watchlist.json"))
}
