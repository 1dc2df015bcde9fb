// Forum HTTP client: unauthenticated JSON GETs against the upstream forum.
//
// A thin reqwest wrapper with a generic GET helper. Each listing fetch is
// retried a few times with exponential backoff before the cycle gives up;
// the orchestrator then skips the cycle and tries again next poll.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::pipeline::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Default upstream forum.
pub const DEFAULT_SOURCE_URL: &str = "https://ethresear.ch";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; ferry/0.1; research relay)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Base delay between listing fetch attempts (doubles each retry).
const FETCH_BACKOFF_BASE: Duration = Duration::from_secs(5);

const FETCH_BACKOFF_MAX: Duration = Duration::from_secs(60);

pub struct ForumClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ForumClient {
    /// Create a client for the forum at `base_url`, making at most
    /// `fetch_attempts` HTTP requests per fetch.
    pub fn new(base_url: &str, fetch_attempts: u32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/html;q=0.9"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(fetch_attempts.max(1), FETCH_BACKOFF_BASE, FETCH_BACKOFF_MAX),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between fetch attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and deserialize the JSON body.
    ///
    /// Network errors, 429 and 5xx responses are retried; any other status
    /// or a body that doesn't deserialize fails immediately.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ExtractionError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(url = %url, attempt, "Forum GET request");

            let (error, retryable) = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await.map_err(|e| ExtractionError::Fetch {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;
                    return serde_json::from_str(&body)
                        .map_err(|e| ExtractionError::Parse(format!("{url}: {e}")));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    (
                        ExtractionError::Status {
                            url: url.clone(),
                            status,
                        },
                        is_retryable_status(status),
                    )
                }
                Err(e) => (
                    ExtractionError::Fetch {
                        url: url.clone(),
                        reason: e.to_string(),
                    },
                    true,
                ),
            };

            if !retryable || !self.retry.should_retry(attempt) {
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Listing fetch failed, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

/// Statuses worth another try: throttling and server-side failures.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
