use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::delivery::message::{DEFAULT_AUTHOR_SEPARATOR, DEFAULT_TEMPLATE};
use crate::delivery::reddit::{RedditCredentials, DEFAULT_USER_AGENT};
use crate::delivery::MessageTemplate;
use crate::filter::{FilterConfig, DEFAULT_EXCLUDED_PHRASES};
use crate::pipeline::retry::{
    RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};
use crate::pipeline::RelaySettings;
use crate::source::client::DEFAULT_SOURCE_URL;
use crate::source::discourse::DEFAULT_MAX_TOPICS;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Central configuration loaded from environment variables.
///
/// Built once at startup and passed down by reference. Secrets come from
/// env vars only; the .env file is loaded automatically via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub max_topics: usize,
    /// HTTP attempts for one listing fetch.
    pub fetch_attempts: u32,
    pub poll_interval: Duration,
    /// Boards to deliver to, in delivery order.
    pub destinations: Vec<String>,
    pub retry: RetryPolicy,
    pub template: MessageTemplate,
    pub filter: FilterConfig,
    pub db_path: String,
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_username: String,
    pub reddit_password: String,
    pub reddit_user_agent: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Everything has a default except the destinations and Reddit
    /// credentials, which only `run`/`once` need (see `require_*`).
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a Config from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and blank are the same thing
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_attempts = parse_or(&get, "FERRY_RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            anyhow::bail!("FERRY_RETRY_MAX_ATTEMPTS must be at least 1");
        }
        let base_delay_ms = parse_or(
            &get,
            "FERRY_RETRY_BASE_DELAY_MS",
            DEFAULT_BASE_DELAY.as_millis() as u64,
        )?;
        let max_delay_ms = parse_or(
            &get,
            "FERRY_RETRY_MAX_DELAY_MS",
            DEFAULT_MAX_DELAY.as_millis() as u64,
        )?;

        let template = get("FERRY_MESSAGE_TEMPLATE")
            .map(|t| unescape_newlines(&t))
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        // The separator is usually ", " so only unset falls back
        let separator = lookup("FERRY_AUTHOR_SEPARATOR")
            .unwrap_or_else(|| DEFAULT_AUTHOR_SEPARATOR.to_string());

        let excluded_phrases = match get("FERRY_EXCLUDE_PHRASES") {
            Some(raw) => split_list(&raw, ','),
            None => DEFAULT_EXCLUDED_PHRASES.iter().map(|p| p.to_string()).collect(),
        };

        Ok(Self {
            source_url: get("FERRY_SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            max_topics: parse_or(&get, "FERRY_MAX_TOPICS", DEFAULT_MAX_TOPICS)?,
            fetch_attempts: parse_or(&get, "FERRY_FETCH_ATTEMPTS", DEFAULT_FETCH_ATTEMPTS)?,
            poll_interval: Duration::from_secs(parse_or(
                &get,
                "FERRY_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            destinations: get("FERRY_DESTINATIONS")
                .map(|raw| split_list(&raw, ','))
                .unwrap_or_default(),
            retry: RetryPolicy::new(
                max_attempts,
                Duration::from_millis(base_delay_ms),
                Duration::from_millis(max_delay_ms),
            ),
            template: MessageTemplate::new(&template, &separator),
            filter: FilterConfig {
                excluded_phrases,
                excluded_patterns: get("FERRY_EXCLUDE_PATTERNS")
                    .map(|raw| split_list(&raw, ';'))
                    .unwrap_or_default(),
                match_excerpt: parse_or(&get, "FERRY_FILTER_EXCERPT", false)?,
            },
            db_path: get("FERRY_DB_PATH").unwrap_or_else(|| "./ferry.db".to_string()),
            reddit_client_id: get("REDDIT_CLIENT_ID").unwrap_or_default(),
            reddit_client_secret: get("REDDIT_CLIENT_SECRET").unwrap_or_default(),
            reddit_username: get("REDDIT_USERNAME").unwrap_or_default(),
            reddit_password: get("REDDIT_PASSWORD").unwrap_or_default(),
            reddit_user_agent: get("REDDIT_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    /// Check that at least one destination is configured.
    pub fn require_destinations(&self) -> Result<()> {
        if self.destinations.is_empty() {
            anyhow::bail!(
                "FERRY_DESTINATIONS not set. Add a comma-separated list of subreddits to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that Reddit credentials are configured.
    /// Call this before building a RedditClient (not needed for --dry-run).
    pub fn require_reddit(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("REDDIT_CLIENT_ID", &self.reddit_client_id),
            ("REDDIT_CLIENT_SECRET", &self.reddit_client_secret),
            ("REDDIT_USERNAME", &self.reddit_username),
            ("REDDIT_PASSWORD", &self.reddit_password),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "{} not set. Add them to your .env file, or use --dry-run.\n\
                 See .env.example for the required variables.",
                missing.join(", ")
            );
        }
        Ok(())
    }

    pub fn reddit_credentials(&self) -> RedditCredentials {
        RedditCredentials {
            client_id: self.reddit_client_id.clone(),
            client_secret: self.reddit_client_secret.clone(),
            username: self.reddit_username.clone(),
            password: self.reddit_password.clone(),
            user_agent: self.reddit_user_agent.clone(),
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            destinations: self.destinations.clone(),
            poll_interval: self.poll_interval,
            retry: self.retry,
            template: self.template.clone(),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `.env` files can't hold real newlines comfortably, so allow `\n`.
fn unescape_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}
