// Fakes for every boundary the relay talks to.
//
// Each fake is cheap to clone-by-Arc so a test can keep a handle for
// assertions while the relay owns another.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ferry::delivery::{DeliveryClient, FormattedMessage, MessageTemplate};
use ferry::error::{DeliveryError, ExtractionError};
use ferry::pipeline::retry::{RetryPolicy, Sleeper};
use ferry::pipeline::shutdown::ShutdownTrigger;
use ferry::pipeline::RelaySettings;
use ferry::source::models::SourcePost;
use ferry::source::traits::Extractor;

pub fn post(topic_id: &str, title: &str) -> SourcePost {
    SourcePost {
        topic_id: topic_id.into(),
        title: title.into(),
        authors: vec!["alice".into()],
        url: format!("https://x/{topic_id}"),
        raw_excerpt: None,
        created_at: None,
    }
}

pub fn settings(destinations: &[&str], retry: RetryPolicy) -> RelaySettings {
    RelaySettings {
        destinations: destinations.iter().map(|d| d.to_string()).collect(),
        poll_interval: Duration::from_secs(300),
        retry,
        template: MessageTemplate::default(),
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(100),
        Duration::from_millis(350),
    )
}

// ── Extractor ───────────────────────────────────────────────────────

/// Returns queued results first, then the same listing forever.
pub struct ScriptedExtractor {
    queued: Mutex<VecDeque<Result<Vec<SourcePost>, ExtractionError>>>,
    listing: Vec<SourcePost>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn listing(posts: Vec<SourcePost>) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(VecDeque::new()),
            listing: posts,
            calls: AtomicUsize::new(0),
        })
    }

    /// Fail the next call, then fall back to the listing.
    pub fn failing_once(posts: Vec<SourcePost>) -> Arc<Self> {
        let extractor = Self::listing(posts);
        extractor
            .queued
            .lock()
            .unwrap()
            .push_back(Err(ExtractionError::Status {
                url: "https://x/latest.json".into(),
                status: 503,
            }));
        extractor
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self) -> Result<Vec<SourcePost>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.queued.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.listing.clone()),
        }
    }
}

// ── Delivery client ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(DeliveryError),
    /// Fire the shutdown trigger and never answer.
    HangAndShutdown,
}

/// Plays a script of outcomes, then `default` forever. Records every call.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Step>>,
    default: Step,
    calls: Mutex<Vec<(String, String)>>,
    trigger: Mutex<Option<ShutdownTrigger>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Step>, default: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            default,
            calls: Mutex::new(Vec::new()),
            trigger: Mutex::new(None),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(vec![], Step::Succeed)
    }

    pub fn always(error: DeliveryError) -> Arc<Self> {
        Self::new(vec![], Step::Fail(error))
    }

    pub fn arm(&self, trigger: ShutdownTrigger) {
        *self.trigger.lock().unwrap() = Some(trigger);
    }

    /// (destination, message title) per call, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedClient {
    async fn deliver(
        &self,
        destination: &str,
        message: &FormattedMessage,
    ) -> Result<(), DeliveryError> {
        self.calls
            .lock()
            .unwrap()
            .push((destination.to_string(), message.title.clone()));

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match step {
            Step::Succeed => Ok(()),
            Step::Fail(e) => Err(e),
            Step::HangAndShutdown => {
                if let Some(trigger) = self.trigger.lock().unwrap().as_ref() {
                    trigger.trigger();
                }
                std::future::pending().await
            }
        }
    }
}

// ── Sleeper ─────────────────────────────────────────────────────────

/// Records requested delays and returns immediately. Optionally fires a
/// shutdown trigger on the first sleep.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
    trigger: Mutex<Option<ShutdownTrigger>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn arm(&self, trigger: ShutdownTrigger) {
        *self.trigger.lock().unwrap() = Some(trigger);
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        let trigger = self.trigger.lock().unwrap().take();
        if let Some(trigger) = trigger {
            trigger.trigger();
            std::future::pending::<()>().await;
        }
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

/// One canned answer from `ScriptedServer`.
pub enum Reply {
    Status(u16, String),
    /// Close the connection without answering.
    Hangup,
}

pub fn reply(status: u16, body: &str) -> Reply {
    Reply::Status(status, body.to_string())
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

/// HTTP/1.1 server on localhost. Each connection gets the next scripted
/// reply and is then closed; once the script runs out every request gets
/// a 500.
pub struct ScriptedServer {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let mut script = VecDeque::from(replies);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                log.lock().unwrap().push(request);
                let next = script
                    .pop_front()
                    .unwrap_or_else(|| reply(500, "script exhausted"));
                if let Reply::Status(status, body) = next {
                    let _ = write_reply(&mut stream, status, &body).await;
                }
            }
        });

        Self { addr, seen }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body_read = buf.len() - head_end;
    while body_read < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body_read += n;
    }

    Some(SeenRequest {
        method,
        path,
        authorization,
    })
}

async fn write_reply(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
