// Discourse listing extractor.
//
// Research forums like ethresear.ch run Discourse, which serves the
// "latest topics" page as JSON at /latest.json. We read that instead of
// scraping the HTML listing: same rows, same pinned flags, stable ids.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::client::ForumClient;
use super::models::SourcePost;
use super::traits::Extractor;
use crate::error::ExtractionError;

const LATEST_PATH: &str = "/latest.json";

/// Default number of listing rows examined per poll.
pub const DEFAULT_MAX_TOPICS: usize = 20;

pub struct DiscourseExtractor {
    client: ForumClient,
    max_topics: usize,
}

impl DiscourseExtractor {
    pub fn new(client: ForumClient, max_topics: usize) -> Self {
        Self { client, max_topics }
    }
}

#[async_trait]
impl Extractor for DiscourseExtractor {
    fn name(&self) -> &str {
        "discourse"
    }

    /// Emits posts oldest-first so boards receive them chronologically.
    async fn extract(&self) -> Result<Vec<SourcePost>, ExtractionError> {
        let listing: LatestResponse = self.client.get_json(LATEST_PATH).await?;
        let posts = posts_from_listing(self.client.base_url(), &listing, self.max_topics);

        info!(
            rows = listing.topic_list.topics.len(),
            posts = posts.len(),
            "Extracted posts from listing"
        );

        Ok(posts)
    }
}

/// Turn a parsed listing into SourcePosts.
///
/// Examines at most `max_topics` rows, skips pinned rows, keeps the first
/// occurrence of any repeated topic id, and orders the result oldest-first.
/// Undated topics keep their relative listing order after the dated ones.
pub fn posts_from_listing(
    base_url: &str,
    listing: &LatestResponse,
    max_topics: usize,
) -> Vec<SourcePost> {
    let names: HashMap<u64, String> = listing
        .users
        .iter()
        .map(|u| (u.id, u.display_name()))
        .collect();

    let mut seen = HashSet::new();
    let mut posts = Vec::new();

    for topic in listing.topic_list.topics.iter().take(max_topics) {
        if topic.pinned || topic.pinned_globally {
            debug!(topic_id = topic.id, title = %topic.title, "Skipping pinned topic");
            continue;
        }
        if !seen.insert(topic.id) {
            continue;
        }

        let authors = topic
            .original_poster()
            .and_then(|user_id| names.get(&user_id).cloned())
            .into_iter()
            .collect();

        posts.push(SourcePost {
            topic_id: topic.id.to_string(),
            title: topic.title.trim().to_string(),
            authors,
            url: format!("{}/t/{}/{}", base_url.trim_end_matches('/'), topic.slug, topic.id),
            raw_excerpt: topic.excerpt.clone().filter(|e| !e.trim().is_empty()),
            created_at: topic.created_at,
        });
    }

    posts.sort_by_key(|p| (p.created_at.is_none(), p.created_at));
    posts
}

// -- Serde types for /latest.json --

#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    #[serde(default)]
    pub users: Vec<ListingUser>,
    pub topic_list: TopicList,
}

#[derive(Debug, Deserialize)]
pub struct ListingUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ListingUser {
    /// Full name when the user set one, otherwise the username.
    fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicList {
    #[serde(default)]
    pub topics: Vec<ListingTopic>,
}

#[derive(Debug, Deserialize)]
pub struct ListingTopic {
    pub id: u64,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub pinned_globally: bool,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub posters: Vec<Poster>,
}

impl ListingTopic {
    /// The user id Discourse marks as "Original Poster", falling back to
    /// the first poster listed.
    fn original_poster(&self) -> Option<u64> {
        self.posters
            .iter()
            .find(|p| {
                p.description
                    .as_deref()
                    .is_some_and(|d| d.contains("Original Poster"))
            })
            .or_else(|| self.posters.first())
            .map(|p| p.user_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct Poster {
    pub user_id: u64,
    #[serde(default)]
    pub description: Option<String>,
}
