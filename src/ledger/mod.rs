// Dedup ledger: which (post, destination) pairs were confirmed delivered.
//
// The whole ledger is loaded into memory once at startup; membership checks
// never touch storage. Every confirmed delivery is written through to the
// store immediately, one row at a time. Rows whose write failed are kept
// and retried ahead of the next write. The SQLite file lives wherever
// FERRY_DB_PATH points (defaults to ./ferry.db).

pub mod memory;
pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use models::{Delivery, DeliveryRecord};
use traits::LedgerStore;

/// Open (or create) the database and its tables.
///
/// Called by `ferry init`. Every other command uses `open`.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
///
/// Starting from an empty ledger would repost everything in the listing,
/// so a missing file is an error rather than a fresh start.
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("Database not found at {}. Run `ferry init` first.", db_path);
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Pick up indexes added since the file was created
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing SQLite ledger as a trait object.
pub fn open_sqlite(db_path: &str) -> Result<Arc<dyn LedgerStore>> {
    let conn = open(db_path)?;
    Ok(Arc::new(sqlite::SqliteLedgerStore::new(conn)))
}

/// In-memory view of the ledger backed by a durable store.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    records: HashMap<String, DeliveryRecord>,
    /// Confirmed in memory, not yet written to the store.
    pending: Vec<Delivery>,
}

impl Ledger {
    /// Load every confirmed delivery from `store`.
    ///
    /// An unreadable store is fatal: the caller must not run without it.
    pub async fn load(store: Arc<dyn LedgerStore>) -> Result<Self, LedgerError> {
        let deliveries = store.load_all().await.map_err(LedgerError::Init)?;

        let records: HashMap<String, DeliveryRecord> = DeliveryRecord::group(&deliveries)
            .into_iter()
            .map(|r| (r.topic_id.clone(), r))
            .collect();

        info!(
            posts = records.len(),
            deliveries = deliveries.len(),
            "Loaded delivery ledger"
        );

        Ok(Self {
            store,
            records,
            pending: Vec::new(),
        })
    }

    /// Whether `topic_id` was already confirmed delivered to `destination`.
    pub fn contains(&self, topic_id: &str, destination: &str) -> bool {
        self.records
            .get(topic_id)
            .is_some_and(|r| r.contains(destination))
    }

    /// Record a confirmed delivery and write it through to the store.
    ///
    /// Recording an existing pair is a no-op. The in-memory entry is added
    /// before the write, so a failed write still blocks a duplicate send
    /// for the rest of this process. Earlier rows that failed to persist
    /// are written first. The error covers only this pair; it stays
    /// pending and is retried on the next `record` or `flush`.
    pub async fn record(
        &mut self,
        topic_id: &str,
        destination: &str,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.contains(topic_id, destination) {
            debug!(topic_id, destination, "Delivery already recorded");
            return Ok(());
        }

        let delivery = Delivery {
            topic_id: topic_id.to_string(),
            destination: destination.to_string(),
            delivered_at: at,
        };

        self.records
            .entry(delivery.topic_id.clone())
            .and_modify(|r| r.absorb(&delivery))
            .or_insert_with(|| DeliveryRecord::new(&delivery));

        if !self.pending.is_empty() {
            if let Err(e) = self.flush().await {
                warn!(error = %e, "Earlier deliveries still not persisted");
            }
        }

        match self.store.insert(&delivery).await {
            Ok(()) => Ok(()),
            Err(error) => {
                let failed = LedgerError::Persist {
                    topic_id: delivery.topic_id.clone(),
                    destination: delivery.destination.clone(),
                    error,
                };
                self.pending.push(delivery);
                Err(failed)
            }
        }
    }

    /// Retry writing every pending row. Rows that persist are dropped from
    /// the pending list; the first failure is returned.
    pub async fn flush(&mut self) -> Result<(), LedgerError> {
        let mut first_error = None;
        let mut still_pending = Vec::new();

        for delivery in std::mem::take(&mut self.pending) {
            match self.store.insert(&delivery).await {
                Ok(()) => {
                    info!(
                        topic_id = %delivery.topic_id,
                        destination = %delivery.destination,
                        "Persisted delayed delivery"
                    );
                }
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(LedgerError::Persist {
                            topic_id: delivery.topic_id.clone(),
                            destination: delivery.destination.clone(),
                            error,
                        });
                    }
                    still_pending.push(delivery);
                }
            }
        }

        self.pending = still_pending;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of confirmed pairs waiting to be written to the store.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn get(&self, topic_id: &str) -> Option<&DeliveryRecord> {
        self.records.get(topic_id)
    }

    /// Number of posts with at least one confirmed destination.
    pub fn post_count(&self) -> usize {
        self.records.len()
    }

    /// Number of confirmed (post, destination) pairs.
    pub fn delivery_count(&self) -> usize {
        self.records.values().map(|r| r.destinations.len()).sum()
    }

    /// Every confirmed pair, flattened back to rows. Used to seed a
    /// throwaway ledger for dry runs.
    pub fn deliveries(&self) -> Vec<Delivery> {
        let mut rows: Vec<Delivery> = self.records.values().flat_map(|r| r.rows()).collect();
        rows.sort_by(|a, b| {
            (&a.topic_id, &a.destination).cmp(&(&b.topic_id, &b.destination))
        });
        rows
    }
}
