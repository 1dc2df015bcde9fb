// Relay orchestrator: poll, filter, dedup, deliver, record. Repeat.
//
// One loop, one writer. Posts are processed in the extractor's order and
// destinations in configured order, strictly one delivery at a time, so the
// ledger never sees two writers. A delivery is recorded the moment it is
// confirmed, before the next destination or post is touched.
//
// Every await in here (listing fetch, delivery round trip, backoff, the
// poll interval sleep) is raced against the shutdown signal. A delivery
// interrupted by shutdown is simply not recorded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::shutdown::Shutdown;
use crate::delivery::{DeliveryClient, FormattedMessage, MessageTemplate};
use crate::error::DeliveryError;
use crate::filter::Filter;
use crate::ledger::Ledger;
use crate::source::models::SourcePost;
use crate::source::traits::Extractor;

/// Everything the relay needs to know that isn't a collaborator.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Delivered to in this order, for every post.
    pub destinations: Vec<String>,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub template: MessageTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Polling,
    Processing,
    Sleeping,
    ShuttingDown,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Posts the extractor returned.
    pub fetched: usize,
    /// Posts the filter rejected.
    pub rejected: usize,
    /// (post, destination) pairs skipped because the ledger had them.
    pub already_delivered: usize,
    /// Pairs confirmed delivered this cycle.
    pub delivered: usize,
    /// Pairs abandoned after a permanent error or exhausted retries.
    pub failed: usize,
    /// Delivered pairs whose ledger write failed.
    pub unpersisted: usize,
    /// Set when the listing could not be fetched; nothing else ran.
    pub extraction_error: Option<String>,
    /// Shutdown arrived before the cycle finished.
    pub interrupted: bool,
}

/// One (post, destination) delivery in progress. Lives only inside
/// `deliver_with_retry` and is dropped when that returns.
struct DeliveryAttempt<'a> {
    topic_id: &'a str,
    destination: &'a str,
    attempt_number: u32,
    last_error: Option<DeliveryError>,
}

enum Outcome {
    Delivered,
    Abandoned,
    Interrupted,
}

pub struct Relay {
    extractor: Arc<dyn Extractor>,
    filter: Filter,
    ledger: Ledger,
    client: Arc<dyn DeliveryClient>,
    sleeper: Arc<dyn Sleeper>,
    settings: RelaySettings,
    state: RelayState,
}

impl Relay {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        filter: Filter,
        ledger: Ledger,
        client: Arc<dyn DeliveryClient>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            extractor,
            filter,
            ledger,
            client,
            sleeper: Arc::new(TokioSleeper),
            settings,
            state: RelayState::Idle,
        }
    }

    /// Replace the sleeper used for backoff and the poll interval.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn transition(&mut self, to: RelayState) {
        debug!(from = ?self.state, to = ?to, "Relay state");
        self.state = to;
    }

    /// Poll and process until shutdown. Returns the number of cycles run.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> u64 {
        info!(
            extractor = self.extractor.name(),
            destinations = ?self.settings.destinations,
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "Relay started"
        );

        let mut cycles = 0u64;
        loop {
            self.transition(RelayState::Idle);
            let report = self.run_cycle(&mut shutdown).await;
            cycles += 1;
            if report.interrupted {
                break;
            }

            self.transition(RelayState::Sleeping);
            let sleeper = Arc::clone(&self.sleeper);
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = sleeper.sleep(self.settings.poll_interval) => {}
            }
        }

        self.transition(RelayState::ShuttingDown);
        info!(cycles, "Relay stopped");
        cycles
    }

    /// One POLLING + PROCESSING pass.
    ///
    /// Never fails: extraction and delivery errors are logged and counted
    /// in the report. Leaves the relay in `Processing`, `Polling` (after an
    /// extraction failure) or `ShuttingDown`.
    pub async fn run_cycle(&mut self, shutdown: &mut Shutdown) -> CycleReport {
        let mut report = CycleReport::default();

        self.transition(RelayState::Polling);
        let extractor = Arc::clone(&self.extractor);
        let extracted = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                report.interrupted = true;
                self.transition(RelayState::ShuttingDown);
                return report;
            }
            result = extractor.extract() => result,
        };

        let posts = match extracted {
            Ok(posts) => posts,
            Err(e) => {
                warn!(
                    extractor = extractor.name(),
                    error = %e,
                    "Extraction failed, skipping cycle"
                );
                report.extraction_error = Some(e.to_string());
                return report;
            }
        };
        report.fetched = posts.len();

        self.transition(RelayState::Processing);
        'posts: for post in &posts {
            if let Some(rule) = self.filter.first_rejection(post) {
                info!(topic_id = %post.topic_id, title = %post.title, rule, "Skipped by filter");
                report.rejected += 1;
                continue;
            }

            let message = self.settings.template.render(post);

            for destination in &self.settings.destinations {
                if self.ledger.contains(&post.topic_id, destination) {
                    debug!(
                        topic_id = %post.topic_id,
                        destination = %destination,
                        "Already delivered"
                    );
                    report.already_delivered += 1;
                    continue;
                }

                let outcome = deliver_with_retry(
                    self.client.as_ref(),
                    self.sleeper.as_ref(),
                    &self.settings.retry,
                    shutdown,
                    post,
                    destination,
                    &message,
                )
                .await;

                match outcome {
                    Outcome::Delivered => {
                        report.delivered += 1;
                        let recorded = self
                            .ledger
                            .record(&post.topic_id, destination, Utc::now())
                            .await;
                        if let Err(e) = recorded {
                            warn!(
                                error = %e,
                                "Delivery confirmed but not persisted; a restart may resend it"
                            );
                            report.unpersisted += 1;
                        }
                    }
                    Outcome::Abandoned => report.failed += 1,
                    Outcome::Interrupted => {
                        report.interrupted = true;
                        break 'posts;
                    }
                }
            }
        }

        if self.ledger.pending_count() > 0 {
            if let Err(e) = self.ledger.flush().await {
                warn!(
                    pending = self.ledger.pending_count(),
                    error = %e,
                    "Ledger writes still failing"
                );
            }
        }

        if report.interrupted {
            self.transition(RelayState::ShuttingDown);
        }

        info!(
            fetched = report.fetched,
            rejected = report.rejected,
            already_delivered = report.already_delivered,
            delivered = report.delivered,
            failed = report.failed,
            unpersisted = report.unpersisted,
            interrupted = report.interrupted,
            "Cycle complete"
        );

        report
    }
}

/// Deliver one message to one destination, retrying transient failures
/// with exponential backoff.
async fn deliver_with_retry(
    client: &dyn DeliveryClient,
    sleeper: &dyn Sleeper,
    policy: &RetryPolicy,
    shutdown: &mut Shutdown,
    post: &SourcePost,
    destination: &str,
    message: &FormattedMessage,
) -> Outcome {
    let mut attempt = DeliveryAttempt {
        topic_id: &post.topic_id,
        destination,
        attempt_number: 0,
        last_error: None,
    };

    loop {
        attempt.attempt_number += 1;

        let result = tokio::select! {
            biased;
            _ = shutdown.wait() => return attempt.interrupted(),
            result = client.deliver(destination, message) => result,
        };

        let err = match result {
            Ok(()) => {
                info!(
                    topic_id = attempt.topic_id,
                    destination = attempt.destination,
                    attempt = attempt.attempt_number,
                    title = %post.title,
                    "Delivered"
                );
                return Outcome::Delivered;
            }
            Err(e) => e,
        };

        if !err.is_transient() {
            error!(
                topic_id = attempt.topic_id,
                destination = attempt.destination,
                attempt = attempt.attempt_number,
                error = %err,
                "Permanent delivery failure, abandoning until next cycle"
            );
            return Outcome::Abandoned;
        }

        if !policy.should_retry(attempt.attempt_number) {
            error!(
                topic_id = attempt.topic_id,
                destination = attempt.destination,
                attempts = attempt.attempt_number,
                error = %err,
                "Retries exhausted, abandoning until next cycle"
            );
            return Outcome::Abandoned;
        }

        let delay = policy.delay_for(attempt.attempt_number);
        warn!(
            topic_id = attempt.topic_id,
            destination = attempt.destination,
            attempt = attempt.attempt_number,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient delivery failure, backing off"
        );
        attempt.last_error = Some(err);

        tokio::select! {
            biased;
            _ = shutdown.wait() => return attempt.interrupted(),
            _ = sleeper.sleep(delay) => {}
        }
    }
}

impl DeliveryAttempt<'_> {
    fn interrupted(&self) -> Outcome {
        let last_error = self
            .last_error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".to_string());
        info!(
            topic_id = self.topic_id,
            destination = self.destination,
            attempt = self.attempt_number,
            last_error = %last_error,
            "Shutdown during delivery, not recorded"
        );
        Outcome::Interrupted
    }
}
