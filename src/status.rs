// Ledger status display: file size, delivery counts, recent deliveries.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::ledger::traits::LedgerStore;
use crate::ledger::Ledger;
use crate::output::terminal;

const RECENT_LIMIT: u32 = 10;

/// Display ledger status to the terminal.
pub async fn show(store: Arc<dyn LedgerStore>, db_display_path: &str) -> Result<()> {
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Ledger: {} ({})", db_display_path, file_size);

    let recent = store.recent(RECENT_LIMIT).await?;
    let ledger = Ledger::load(store).await?;

    println!(
        "Delivered: {} posts, {} (post, destination) pairs",
        ledger.post_count(),
        ledger.delivery_count()
    );

    for (destination, count) in per_destination(&ledger) {
        println!("  {:<24} {}", destination, count);
    }

    terminal::display_recent_deliveries(&recent);

    Ok(())
}

/// Whether a ledger database exists at `db_path`.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn per_destination(ledger: &Ledger) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for d in ledger.deliveries() {
        *counts.entry(d.destination).or_insert(0) += 1;
    }
    counts
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
