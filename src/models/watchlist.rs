use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Optional provider metadata attached to a watched symbol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl SymbolMeta {
    fn is_empty(&self) -> bool {
        self.market_type.is_none() && self.exchange.is_none() && self.currency.is_none()
    }
}

/// On-disk watchlist layouts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WatchlistFile {
    Symbols(Vec<String>),
    Detailed(BTreeMap<String, SymbolMeta>),
}

/// Symbols under continuous evaluation, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Watchlist {
    entries: Vec<(String, SymbolMeta)>,
}

/// Watchlist shared between the scheduler and whoever edits membership
pub type SharedWatchlist = Arc<RwLock<Watchlist>>;

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut watchlist = Self::new();
        for symbol in symbols {
            watchlist.add(symbol);
        }
        watchlist
    }

    /// Load from a JSON file holding either `["AAPL", ...]` or
    /// `{"AAPL": {"market_type": "stocks", ...}, ...}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Cannot read watchlist {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: WatchlistFile = serde_json::from_str(content)
            .map_err(|e| AppError::Parse(format!("Invalid watchlist JSON: {}", e)))?;

        let mut watchlist = Self::new();
        match parsed {
            WatchlistFile::Symbols(symbols) => {
                for symbol in symbols {
                    watchlist.add(symbol);
                }
            }
            WatchlistFile::Detailed(map) => {
                for (symbol, meta) in map {
                    watchlist.add_with_meta(symbol, meta);
                }
            }
        }
        Ok(watchlist)
    }

    /// Write the watchlist back to disk. Plain symbol lists stay plain.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = if self.entries.iter().all(|(_, meta)| meta.is_empty()) {
            serde_json::to_string_pretty(&self.symbols())?
        } else {
            let map: BTreeMap<&str, &SymbolMeta> = self
                .entries
                .iter()
                .map(|(symbol, meta)| (symbol.as_str(), meta))
                .collect();
            serde_json::to_string_pretty(&map)?
        };
        fs::write(path, json)?;
        Ok(())
    }

    /// Add a symbol. Returns false when it was already watched.
    pub fn add(&mut self, symbol: impl Into<String>) -> bool {
        self.add_with_meta(symbol, SymbolMeta::default())
    }

    pub fn add_with_meta(&mut self, symbol: impl Into<String>, meta: SymbolMeta) -> bool {
        let symbol = normalize(symbol.into());
        if symbol.is_empty() || self.contains(&symbol) {
            return false;
        }
        self.entries.push((symbol, meta));
        true
    }

    /// Remove a symbol. Returns false when it was not watched.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let symbol = normalize(symbol.to_string());
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != symbol);
        self.entries.len() != before
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == symbol)
    }

    pub fn meta(&self, symbol: &str) -> Option<&SymbolMeta> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == symbol)
            .map(|(_, meta)| meta)
    }

    /// Owned copy of the membership, used as a cycle's fixed symbol list
    pub fn symbols(&self) -> Vec<String> {
        self.entries.iter().map(|(symbol, _)| symbol.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_shared(self) -> SharedWatchlist {
        Arc::new(RwLock::new(self))
    }
}

fn normalize(symbol: String) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_array_format_keeps_order_and_dedups() {
        let watchlist = Watchlist::from_json(r#"["msft", "AAPL", "MSFT", " x:btcusd "]"#).unwrap();
        assert_eq!(watchlist.symbols(), vec!["MSFT", "AAPL", "X:BTCUSD"]);
    }

    #[test]
    fn test_object_format_reads_metadata() {
        let watchlist = Watchlist::from_json(
            r#"{"C:EURUSD": {"market_type": "forex", "currency": "USD"}, "AAPL": {}}"#,
        )
        .unwrap();
        assert_eq!(watchlist.len(), 2);
        assert_eq!(
            watchlist.meta("C:EURUSD").and_then(|m| m.market_type.as_deref()),
            Some("forex")
        );
    }

    #[test]
    fn test_add_remove() {
        let mut watchlist = Watchlist::from_symbols(["AAPL"]);
        assert!(watchlist.add("tsla"));
        assert!(!watchlist.add("TSLA"));
        assert!(!watchlist.add("  "));
        assert!(watchlist.remove("aapl"));
        assert!(!watchlist.remove("AAPL"));
        assert_eq!(watchlist.symbols(), vec!["TSLA"]);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = Watchlist::from_json(r#"{"AAPL": 3}"#).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watchlist.json");

        let watchlist = Watchlist::from_symbols(["NVDA", "AMD"]);
        watchlist.save_to_file(&path).unwrap();
        assert_eq!(Watchlist::from_file(&path).unwrap(), watchlist);

        let mut detailed = Watchlist::new();
        detailed.add_with_meta(
            "X:ETHUSD",
            SymbolMeta { market_type: Some("crypto".into()), ..Default::default() },
        );
        detailed.save_to_file(&path).unwrap();
        assert_eq!(Watchlist::from_file(&path).unwrap(), detailed);
    }
}
