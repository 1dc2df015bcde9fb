// Ledger storage trait: backend-agnostic durable store for deliveries.
//
// Implementors: SqliteLedgerStore (production), MemoryLedgerStore (tests,
// dry runs). The Ledger loads everything once at startup and then writes
// single rows through this interface; it never rewrites the whole store.

use anyhow::Result;
use async_trait::async_trait;

use super::models::Delivery;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Every confirmed delivery. Called once at startup.
    async fn load_all(&self) -> Result<Vec<Delivery>>;

    /// Persist one confirmed delivery. Inserting an existing
    /// (topic_id, destination) pair is a no-op, not an error.
    async fn insert(&self, delivery: &Delivery) -> Result<()>;

    /// Most recent deliveries, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<Delivery>>;

    /// Out-of-band reset. Returns the number of deliveries removed.
    async fn clear(&self) -> Result<u64>;
}
