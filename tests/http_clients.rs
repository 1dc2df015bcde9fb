// Forum and Reddit clients against a local scripted HTTP server.
//
// These cover the request-level behavior the pure classifiers can't:
// how many requests go out, which failures are retried, and token reuse.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{post, reply, RecordingSleeper, Reply, ScriptedServer};
use ferry::delivery::reddit::{RedditClient, RedditCredentials};
use ferry::delivery::{DeliveryClient, FormattedMessage, MessageTemplate};
use ferry::error::ExtractionError;
use ferry::source::client::ForumClient;
use ferry::source::discourse::DiscourseExtractor;
use ferry::source::traits::Extractor;

const LISTING: &str = r#"{
    "users": [{"id": 1, "username": "vbuterin", "name": "Vitalik"}],
    "topic_list": {"topics": [{
        "id": 42,
        "title": "New Rollup Design",
        "slug": "new-rollup-design",
        "created_at": "2025-03-01T12:00:00.000Z",
        "posters": [{"user_id": 1, "description": "Original Poster"}]
    }]}
}"#;

const TOKEN_ABC: &str =
    r#"{"access_token": "abc", "token_type": "bearer", "expires_in": 86400, "scope": "*"}"#;
const TOKEN_DEF: &str =
    r#"{"access_token": "def", "token_type": "bearer", "expires_in": 86400, "scope": "*"}"#;
const SUBMITTED: &str =
    r#"{"json": {"errors": [], "data": {"url": "https://reddit.com/r/ethereum/comments/abc"}}}"#;

// ============================================================
// Forum listing fetch
// ============================================================

fn extractor(
    server: &ScriptedServer,
    attempts: u32,
    sleeper: &Arc<RecordingSleeper>,
) -> DiscourseExtractor {
    let client = ForumClient::new(&server.url(), attempts)
        .unwrap()
        .with_sleeper(sleeper.clone());
    DiscourseExtractor::new(client, 20)
}

#[tokio::test]
async fn listing_fetch_retries_server_errors_and_hangups() {
    let server =
        ScriptedServer::start(vec![reply(503, ""), Reply::Hangup, reply(200, LISTING)]).await;
    let sleeper = RecordingSleeper::new();

    let posts = extractor(&server, 3, &sleeper).extract().await.unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].topic_id, "42");
    assert_eq!(posts[0].url, format!("{}/t/new-rollup-design/42", server.url()));
    assert_eq!(server.paths(), vec!["/latest.json"; 3]);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn listing_fetch_gives_up_after_attempt_budget() {
    let server =
        ScriptedServer::start(vec![reply(429, ""), reply(502, ""), reply(500, "")]).await;
    let sleeper = RecordingSleeper::new();

    let err = extractor(&server, 3, &sleeper).extract().await.unwrap_err();

    assert!(matches!(err, ExtractionError::Status { status: 500, .. }));
    assert_eq!(server.requests().len(), 3);
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn listing_not_found_fails_without_retry() {
    let server = ScriptedServer::start(vec![reply(404, "")]).await;
    let sleeper = RecordingSleeper::new();

    let err = extractor(&server, 3, &sleeper).extract().await.unwrap_err();

    assert!(matches!(err, ExtractionError::Status { status: 404, .. }));
    assert_eq!(server.requests().len(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn malformed_listing_is_parse_error_not_empty() {
    let server = ScriptedServer::start(vec![reply(200, "<html>maintenance</html>")]).await;
    let sleeper = RecordingSleeper::new();

    let err = extractor(&server, 3, &sleeper).extract().await.unwrap_err();

    assert!(matches!(err, ExtractionError::Parse(_)));
    assert_eq!(server.requests().len(), 1);
}

// ============================================================
// Reddit delivery
// ============================================================

fn reddit(server: &ScriptedServer) -> RedditClient {
    let credentials = RedditCredentials {
        client_id: "id".into(),
        client_secret: "secret".into(),
        username: "ferrybot".into(),
        password: "hunter2".into(),
        user_agent: "ferry-tests".into(),
    };
    let base = server.url();
    RedditClient::new(credentials)
        .unwrap()
        .with_endpoints(&format!("{base}/api/v1/access_token"), &base)
        .with_min_interval(Duration::ZERO)
}

fn message() -> FormattedMessage {
    MessageTemplate::default().render(&post("42", "New Rollup Design"))
}

#[tokio::test]
async fn token_is_fetched_once_and_reused() {
    let server = ScriptedServer::start(vec![
        reply(200, TOKEN_ABC),
        reply(200, SUBMITTED),
        reply(200, SUBMITTED),
    ])
    .await;
    let client = reddit(&server);

    client.deliver("ethereum", &message()).await.unwrap();
    client.deliver("ethfinance", &message()).await.unwrap();

    assert_eq!(
        server.paths(),
        vec!["/api/v1/access_token", "/api/submit", "/api/submit"]
    );
    let requests = server.requests();
    assert!(requests.iter().all(|r| r.method == "POST"));
    assert!(requests[0]
        .authorization
        .as_deref()
        .is_some_and(|a| a.starts_with("Basic ")));
    assert_eq!(requests[1].authorization.as_deref(), Some("Bearer abc"));
    assert_eq!(requests[2].authorization.as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn unauthorized_submit_forces_new_token() {
    let server = ScriptedServer::start(vec![
        reply(200, TOKEN_ABC),
        reply(401, r#"{"message": "Unauthorized", "error": 401}"#),
        reply(200, TOKEN_DEF),
        reply(200, SUBMITTED),
    ])
    .await;
    let client = reddit(&server);

    let err = client.deliver("ethereum", &message()).await.unwrap_err();
    assert!(!err.is_transient());

    client.deliver("ethereum", &message()).await.unwrap();

    assert_eq!(
        server.paths(),
        vec![
            "/api/v1/access_token",
            "/api/submit",
            "/api/v1/access_token",
            "/api/submit"
        ]
    );
    assert_eq!(server.requests()[3].authorization.as_deref(), Some("Bearer def"));
}

#[tokio::test]
async fn accepted_submit_with_unreadable_body_is_delivered() {
    let server = ScriptedServer::start(vec![
        reply(200, TOKEN_ABC),
        reply(200, "<html>upstream hiccup</html>"),
    ])
    .await;
    let client = reddit(&server);

    client.deliver("ethereum", &message()).await.unwrap();
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn submit_failures_are_classified() {
    let server = ScriptedServer::start(vec![
        reply(200, TOKEN_ABC),
        reply(503, ""),
        reply(
            200,
            r#"{"json": {"errors": [["RATELIMIT", "try again in 5 minutes", "ratelimit"]]}}"#,
        ),
        reply(
            200,
            r#"{"json": {"errors": [["SUBREDDIT_NOEXIST", "that subreddit doesn't exist", "sr"]]}}"#,
        ),
    ])
    .await;
    let client = reddit(&server);

    assert!(client.deliver("ethereum", &message()).await.unwrap_err().is_transient());
    assert!(client.deliver("ethereum", &message()).await.unwrap_err().is_transient());
    assert!(!client.deliver("nosuchsub", &message()).await.unwrap_err().is_transient());
    assert_eq!(server.requests().len(), 4);
}

#[tokio::test]
async fn rejected_credentials_are_permanent() {
    let server = ScriptedServer::start(vec![reply(200, r#"{"error": "invalid_grant"}"#)]).await;
    let client = reddit(&server);

    let err = client.deliver("ethereum", &message()).await.unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(server.paths(), vec!["/api/v1/access_token"]);
}
