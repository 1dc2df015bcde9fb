// Minimum-spacing rate limiter for API calls.
//
// Reddit asks OAuth clients to stay at or under one request per second.
// Each caller reserves the next free slot under the lock, then sleeps until
// that slot outside it, so concurrent callers queue up instead of all
// waking at once.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Allow at most one request per `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for this caller's slot.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
