// SqliteLedgerStore: rusqlite backend implementing LedgerStore.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Each method locks, runs one synchronous query from queries.rs, and returns.
// The lock is never held across an .await.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::Delivery;
use super::queries;
use super::traits::LedgerStore;

pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Wrap an already-opened connection whose tables exist.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn load_all(&self) -> Result<Vec<Delivery>> {
        let conn = self.conn.lock().await;
        queries::load_deliveries(&conn)
    }

    async fn insert(&self, delivery: &Delivery) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::insert_delivery(&conn, delivery)?;
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Delivery>> {
        let conn = self.conn.lock().await;
        queries::recent_deliveries(&conn, limit)
    }

    async fn clear(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        queries::clear_deliveries(&conn)
    }
}
