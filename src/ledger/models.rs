// Ledger data model.
//
// On disk the ledger is one row per confirmed (topic, destination) pair.
// In memory those rows are grouped per topic into DeliveryRecords.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// One confirmed delivery of a post to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic_id: String,
    pub destination: String,
    pub delivered_at: DateTime<Utc>,
}

/// Everything the ledger knows about one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub topic_id: String,
    /// Confirmed destinations and when each was delivered.
    pub destinations: BTreeMap<String, DateTime<Utc>>,
}

impl DeliveryRecord {
    pub fn new(delivery: &Delivery) -> Self {
        Self {
            topic_id: delivery.topic_id.clone(),
            destinations: BTreeMap::from([(
                delivery.destination.clone(),
                delivery.delivered_at,
            )]),
        }
    }

    /// Fold another confirmed destination into this record. A destination
    /// already present keeps its first timestamp.
    pub fn absorb(&mut self, delivery: &Delivery) {
        self.destinations
            .entry(delivery.destination.clone())
            .or_insert(delivery.delivered_at);
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.destinations.contains_key(destination)
    }

    pub fn delivered_at(&self, destination: &str) -> Option<DateTime<Utc>> {
        self.destinations.get(destination).copied()
    }

    /// Flatten back to one row per destination.
    pub fn rows(&self) -> impl Iterator<Item = Delivery> + '_ {
        self.destinations.iter().map(|(destination, at)| Delivery {
            topic_id: self.topic_id.clone(),
            destination: destination.clone(),
            delivered_at: *at,
        })
    }

    /// Group per-pair rows into per-topic records, ordered by topic id.
    pub fn group(deliveries: &[Delivery]) -> Vec<DeliveryRecord> {
        let mut by_topic: BTreeMap<&str, DeliveryRecord> = BTreeMap::new();
        for d in deliveries {
            by_topic
                .entry(d.topic_id.as_str())
                .and_modify(|r| r.absorb(d))
                .or_insert_with(|| DeliveryRecord::new(d));
        }
        by_topic.into_values().collect()
    }
}
