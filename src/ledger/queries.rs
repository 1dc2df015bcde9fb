// Ledger queries: every SQL statement the ledger runs lives here.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::models::Delivery;

/// Record one confirmed delivery. Returns false if the pair was already
/// present (the existing row is left untouched).
pub fn insert_delivery(conn: &Connection, delivery: &Delivery) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO deliveries (topic_id, destination, delivered_at)
         VALUES (?1, ?2, ?3)",
        params![
            delivery.topic_id,
            delivery.destination,
            delivery.delivered_at.to_rfc3339()
        ],
    )?;
    Ok(changed > 0)
}

/// Every delivery, oldest first.
pub fn load_deliveries(conn: &Connection) -> Result<Vec<Delivery>> {
    let mut stmt = conn.prepare(
        "SELECT topic_id, destination, delivered_at FROM deliveries
         ORDER BY delivered_at ASC, topic_id ASC, destination ASC",
    )?;
    collect_rows(&mut stmt, [])
}

/// The `limit` most recent deliveries, newest first.
pub fn recent_deliveries(conn: &Connection, limit: u32) -> Result<Vec<Delivery>> {
    let mut stmt = conn.prepare(
        "SELECT topic_id, destination, delivered_at FROM deliveries
         ORDER BY delivered_at DESC, topic_id DESC
         LIMIT ?1",
    )?;
    collect_rows(&mut stmt, params![limit])
}

/// Delete every delivery. Returns the number of rows removed.
pub fn clear_deliveries(conn: &Connection) -> Result<u64> {
    let removed = conn.execute("DELETE FROM deliveries", [])?;
    Ok(removed as u64)
}

fn collect_rows<P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> Result<Vec<Delivery>> {
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut deliveries = Vec::new();
    for row in rows {
        let (topic_id, destination, delivered_at) = row?;
        let delivered_at = DateTime::parse_from_rfc3339(&delivered_at)
            .with_context(|| {
                format!("Bad delivered_at for topic {topic_id} -> {destination}: {delivered_at}")
            })?
            .with_timezone(&Utc);
        deliveries.push(Delivery {
            topic_id,
            destination,
            delivered_at,
        });
    }
    Ok(deliveries)
}
