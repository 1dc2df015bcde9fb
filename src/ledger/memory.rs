// In-memory LedgerStore, used by `--dry-run` and by tests.
//
// Clones share state, so a test can keep a handle while the relay owns
// another. Load and write failures can be switched on to exercise the
// ledger's error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::models::Delivery;
use super::traits::LedgerStore;

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    rows: Arc<Mutex<Vec<Delivery>>>,
    fail_loads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with existing deliveries.
    pub fn with_deliveries(deliveries: Vec<Delivery>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(deliveries)),
            ..Self::default()
        }
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of everything persisted so far.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, Vec<Delivery>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow!("memory ledger lock poisoned"))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load_all(&self) -> Result<Vec<Delivery>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            bail!("ledger storage unreadable");
        }
        Ok(self.rows()?.clone())
    }

    async fn insert(&self, delivery: &Delivery) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("ledger storage not writable");
        }
        let mut rows = self.rows()?;
        let exists = rows
            .iter()
            .any(|d| d.topic_id == delivery.topic_id && d.destination == delivery.destination);
        if !exists {
            rows.push(delivery.clone());
        }
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Delivery>> {
        let mut rows = self.rows()?.clone();
        rows.sort_by(|a, b| b.delivered_at.cmp(&a.delivered_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn clear(&self) -> Result<u64> {
        let mut rows = self.rows()?;
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn delivery(topic: &str) -> Delivery {
        Delivery {
            topic_id: topic.into(),
            destination: "sub1".into(),
            delivered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_clones_share_rows() {
        let store = MemoryLedgerStore::new();
        let handle = store.clone();
        store.insert(&delivery("1")).await.unwrap();
        assert_eq!(handle.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_ignored() {
        let store = MemoryLedgerStore::new();
        store.insert(&delivery("1")).await.unwrap();
        store.insert(&delivery("1")).await.unwrap();
        assert_eq!(store.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let store = MemoryLedgerStore::with_deliveries(vec![delivery("1")]);
        store.set_fail_loads(true);
        assert!(store.load_all().await.is_err());
        store.set_fail_loads(false);
        assert_eq!(store.load_all().await.unwrap().len(), 1);

        store.set_fail_writes(true);
        assert!(store.insert(&delivery("2")).await.is_err());
        assert_eq!(store.deliveries().len(), 1);
    }
}
