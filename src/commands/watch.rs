use crate::cli::WatchAction;
use crate::error::Result;
use crate::models::Watchlist;
use crate::utils::get_watchlist_path;
use std::path::{Path, PathBuf};

pub fn run(action: WatchAction, watchlist: Option<PathBuf>) {
    let path = watchlist.unwrap_or_else(get_watchlist_path);
    if let Err(e) = apply(action, &path) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn apply(action: WatchAction, path: &Path) -> Result<()> {
    let mut watchlist = if path.exists() {
        Watchlist::from_file(path)?
    } else {
        Watchlist::new()
    };

    match action {
        WatchAction::Add { symbols } => {
            let added = symbols.iter().filter(|s| watchlist.add(s.as_str())).count();
            watchlist.save_to_file(path)?;
            println!("✅ Added {} symbol(s), {} watched", added, watchlist.len());
        }
        WatchAction::Remove { symbols } => {
            let removed = symbols.iter().filter(|s| watchlist.remove(s)).count();
            watchlist.save_to_file(path)?;
            println!("✅ Removed {} symbol(s), {} watched", removed, watchlist.len());
        }
        WatchAction::List => {
            for symbol in watchlist.symbols() {
                println!("{}", symbol);
            }
            println!("\n📋 {} symbol(s) in {}", watchlist.len(), path.display());
        }
    }
    Ok(())
}
