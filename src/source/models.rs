// Source data model: one upstream forum item.

use chrono::{DateTime, Utc};

/// One item from the upstream research listing.
///
/// `topic_id` is assigned by the forum and never changes, so it is the only
/// dedup key. Title or URL edits upstream do not make a post "new".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePost {
    pub topic_id: String,
    pub title: String,
    /// Display names in credit order. May be empty.
    pub authors: Vec<String>,
    /// Canonical link back to the forum thread.
    pub url: String,
    /// Body snippet, when the listing provides one.
    pub raw_excerpt: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
