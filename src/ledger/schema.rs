// Ledger schema.
//
// `schema_version` records the layout version a file was created with.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current on-disk layout.
pub const SCHEMA_VERSION: i64 = 1;

/// Create all tables and indexes if they don't exist yet.
///
/// Idempotent. Safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per confirmed (post, destination) delivery
        CREATE TABLE IF NOT EXISTS deliveries (
            topic_id TEXT NOT NULL,
            destination TEXT NOT NULL,
            delivered_at TEXT NOT NULL,        -- RFC 3339, UTC
            PRIMARY KEY (topic_id, destination)
        );

        -- status lists the most recent deliveries
        CREATE INDEX IF NOT EXISTS idx_deliveries_time
            ON deliveries(delivered_at);
        ",
    )
    .context("Failed to create ledger tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )
    .context("Failed to record schema version")?;

    Ok(())
}

/// Count the tables in the database (printed by `ferry init`).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
