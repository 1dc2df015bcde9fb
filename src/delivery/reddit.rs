// Reddit delivery client.
//
// Authenticates as a script app (OAuth password grant), caches the bearer
// token until shortly before it expires, and submits self posts through
// /api/submit. Every failure is classified as Transient or Permanent so the
// relay knows whether backing off and retrying can help.
//
// API docs: https://www.reddit.com/dev/api#POST_api_submit

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::message::FormattedMessage;
use super::rate_limiter::RateLimiter;
use super::traits::DeliveryClient;
use crate::error::DeliveryError;

pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const API_BASE: &str = "https://oauth.reddit.com";

pub const DEFAULT_USER_AGENT: &str = "ferry/0.1 (research relay)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh the token this long before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Reddit API errors that mean "slow down", not "never".
const TRANSIENT_API_ERRORS: [&str; 1] = ["RATELIMIT"];

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct RedditClient {
    http: reqwest::Client,
    credentials: RedditCredentials,
    token_url: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
    rate_limiter: RateLimiter,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build Reddit HTTP client: {e}"))?;

        Ok(Self {
            http,
            credentials,
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
            token: Mutex::new(None),
            // Reddit OAuth clients: 1 request per second
            rate_limiter: RateLimiter::with_interval(Duration::from_secs(1)),
        })
    }

    /// Point the client at a different token endpoint and API host.
    pub fn with_endpoints(mut self, token_url: &str, api_base: &str) -> Self {
        self.token_url = token_url.to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Override the minimum spacing between API requests.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.rate_limiter = RateLimiter::with_interval(interval);
        self
    }

    /// A valid bearer token, fetching a new one if none is cached or the
    /// cached one is about to expire.
    async fn access_token(&self) -> Result<String, DeliveryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        self.rate_limiter.acquire().await;
        debug!(username = %self.credentials.username, "Requesting Reddit access token");

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &format!("token request: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transient(format!("unreadable token response: {e}")))?;
        let (access_token, expires_in) = token.into_grant()?;

        let lifetime = Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        info!(expires_in, "Authenticated with Reddit");

        Ok(access_token)
    }

    async fn submit(
        &self,
        token: &str,
        destination: &str,
        message: &FormattedMessage,
    ) -> Result<(), DeliveryError> {
        self.rate_limiter.acquire().await;

        let response = self
            .http
            .post(format!("{}/api/submit", self.api_base))
            .bearer_auth(token)
            .form(&[
                ("api_type", "json"),
                ("kind", "self"),
                ("sr", destination),
                ("title", message.title.as_str()),
                ("text", message.body.as_str()),
                ("resubmit", "true"),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Revoked or expired early; fetch a fresh one next time
                *self.token.lock().await = None;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        // Reddit has accepted the request from here on; retrying would
        // create a second post.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(destination, error = %e, "Submission accepted but body unreadable");
                return Ok(());
            }
        };

        let url = read_submit_body(&body)?.unwrap_or_default();
        debug!(destination, url = %url, "Reddit accepted submission");
        Ok(())
    }
}

#[async_trait]
impl DeliveryClient for RedditClient {
    async fn deliver(
        &self,
        destination: &str,
        message: &FormattedMessage,
    ) -> Result<(), DeliveryError> {
        let token = self.access_token().await?;
        self.submit(&token, destination, message).await
    }
}

/// Network-level failures: the request never got a response.
fn classify_transport(error: &reqwest::Error) -> DeliveryError {
    if error.is_builder() {
        warn!(error = %error, "Malformed Reddit request");
        DeliveryError::Permanent(format!("malformed request: {error}"))
    } else {
        DeliveryError::Transient(format!("network error: {error}"))
    }
}

/// Non-success HTTP status from Reddit.
pub fn classify_status(status: StatusCode, body: &str) -> DeliveryError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryError::Transient(detail)
    } else {
        DeliveryError::Permanent(detail)
    }
}

/// Errors reported inside a 200 response, as `[code, message, field]`
/// triples. Returns None when the submission was accepted.
pub fn classify_api_errors(errors: &[Vec<serde_json::Value>]) -> Option<DeliveryError> {
    let first = errors.first()?;
    let part = |i: usize| first.get(i).and_then(|v| v.as_str()).unwrap_or("");
    let (code, message) = (part(0), part(1));
    let detail = format!("{code}: {message}");

    if TRANSIENT_API_ERRORS.contains(&code) {
        Some(DeliveryError::Transient(detail))
    } else {
        Some(DeliveryError::Permanent(detail))
    }
}

/// Interpret the body of a 2xx /api/submit response. Returns the new
/// post's URL when Reddit reports one.
///
/// A body that doesn't parse still counts as delivered.
pub fn read_submit_body(body: &str) -> Result<Option<String>, DeliveryError> {
    let result: SubmitResponse = match serde_json::from_str(body) {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Unreadable submit response, treating as delivered");
            return Ok(None);
        }
    };

    if let Some(error) = classify_api_errors(&result.json.errors) {
        return Err(error);
    }

    Ok(result.json.data.and_then(|d| d.url))
}

// --- Reddit API response types ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    /// Set instead of a token when the credentials are rejected.
    #[serde(default)]
    error: Option<String>,
}

impl TokenResponse {
    fn into_grant(self) -> Result<(String, u64), DeliveryError> {
        match (self.access_token, self.error) {
            (_, Some(error)) => Err(DeliveryError::Permanent(format!(
                "Reddit rejected credentials: {error}"
            ))),
            (Some(token), None) => Ok((token, self.expires_in.unwrap_or(3600))),
            (None, None) => Err(DeliveryError::Permanent(
                "token response carried no access_token".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Debug, Deserialize)]
struct SubmitJson {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(default)]
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── classify_status ─────────────────────────────────────────────

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
    }

    #[test]
    fn test_auth_and_client_errors_are_permanent() {
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!classify_status(StatusCode::FORBIDDEN, "").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "").is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND, "").is_transient());
    }

    #[test]
    fn test_status_detail_includes_body() {
        let err = classify_status(StatusCode::FORBIDDEN, "  {\"reason\": \"banned\"}\n");
        assert_eq!(
            err,
            DeliveryError::Permanent("HTTP 403: {\"reason\": \"banned\"}".into())
        );
    }

    // ── classify_api_errors ─────────────────────────────────────────

    fn parse_errors(json: &str) -> Vec<Vec<serde_json::Value>> {
        let resp: SubmitResponse = serde_json::from_str(json).unwrap();
        resp.json.errors
    }

    #[test]
    fn test_accepted_submission_has_no_error() {
        let errors = parse_errors(
            r#"{"json": {"errors": [], "data": {"url": "https://reddit.com/r/x/comments/abc"}}}"#,
        );
        assert!(classify_api_errors(&errors).is_none());
    }

    #[test]
    fn test_ratelimit_api_error_is_transient() {
        let errors = parse_errors(
            r#"{"json": {"errors": [["RATELIMIT", "you are doing that too much", "ratelimit"]]}}"#,
        );
        let err = classify_api_errors(&errors).unwrap();
        assert!(err.is_transient());
        assert!(err.to_string().contains("RATELIMIT"));
    }

    #[test]
    fn test_other_api_errors_are_permanent() {
        let errors = parse_errors(
            r#"{"json": {"errors": [["SUBREDDIT_NOEXIST", "that subreddit doesn't exist", null]]}}"#,
        );
        let err = classify_api_errors(&errors).unwrap();
        assert_eq!(
            err,
            DeliveryError::Permanent("SUBREDDIT_NOEXIST: that subreddit doesn't exist".into())
        );
    }

    // ── read_submit_body ────────────────────────────────────────────

    #[test]
    fn test_submit_body_returns_post_url() {
        let url = read_submit_body(
            r#"{"json": {"errors": [], "data": {"url": "https://reddit.com/r/x/comments/abc"}}}"#,
        )
        .unwrap();
        assert_eq!(url.as_deref(), Some("https://reddit.com/r/x/comments/abc"));
    }

    #[test]
    fn test_unreadable_submit_body_counts_as_delivered() {
        assert_eq!(read_submit_body("<html>upstream hiccup</html>"), Ok(None));
        assert_eq!(read_submit_body(""), Ok(None));
    }

    #[test]
    fn test_submit_body_api_error_is_classified() {
        let err = read_submit_body(
            r#"{"json": {"errors": [["RATELIMIT", "try again in 5 minutes", "ratelimit"]]}}"#,
        )
        .unwrap_err();
        assert!(err.is_transient());
    }

    // ── token response ──────────────────────────────────────────────

    #[test]
    fn test_token_grant() {
        let t: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "bearer", "expires_in": 86400, "scope": "*"}"#,
        )
        .unwrap();
        assert_eq!(t.into_grant().unwrap(), ("abc".to_string(), 86400));
    }

    #[test]
    fn test_token_rejected_credentials_is_permanent() {
        let t: TokenResponse = serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        let err = t.into_grant().unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn test_token_missing_everything_is_permanent() {
        let t: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(!t.into_grant().unwrap_err().is_transient());
    }
}
