// Error taxonomy for the relay.
//
// Plumbing (config, SQL, HTTP setup) uses anyhow. The types here exist
// because the orchestrator branches on them: an extraction failure skips
// the cycle, a transient delivery failure is retried, a permanent one is
// abandoned, and only a ledger init failure stops the process.

use thiserror::Error;

/// The upstream listing could not be fetched or understood.
///
/// Extractors return this instead of an empty list so the orchestrator
/// can tell "no new posts" apart from "fetch failed".
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("listing request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("listing {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("listing could not be parsed: {0}")]
    Parse(String),
}

/// A failed delivery, split by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Rate limits, timeouts, 5xx. Retried with backoff.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Auth failures, rejected content. Never retried within a cycle.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Fatal at startup. Running with an unreadable ledger risks reposting
    /// everything in the listing.
    #[error("delivery ledger could not be loaded: {0:#}")]
    Init(anyhow::Error),

    /// Non-fatal. The in-memory record still blocks duplicates until restart.
    #[error("failed to persist delivery of topic {topic_id} to {destination}: {error:#}")]
    Persist {
        topic_id: String,
        destination: String,
        error: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DeliveryError::Transient("429".into()).is_transient());
        assert!(!DeliveryError::Permanent("403".into()).is_transient());
    }

    #[test]
    fn test_persist_error_names_the_pair() {
        let err = LedgerError::Persist {
            topic_id: "42".into(),
            destination: "ethereum".into(),
            error: anyhow::anyhow!("disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("ethereum"));
        assert!(msg.contains("disk full"));
    }
}
