//! Client-side throttle that keeps us under the Resi Studio request quota.
//!
//! Not a token bucket: we remember when each of the last
//! requests went out and refuse to send another while `limit` of them are still
//! inside the trailing window. Waiting callers queue on a fair mutex, so they are
//! admitted in the order they arrived.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Requests the API tolerates per [`TIME_WINDOW`].
pub const REQUEST_LIMIT: usize = 10;
pub const TIME_WINDOW: Duration = Duration::from_secs(60);

/// Longest we sleep before looking at the request log again.
const RECHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    request_log: Mutex<VecDeque<Instant>>,
}

/// Permission to send one request.
///
/// The request log stays locked until the admission is consumed by
/// [`Admission::record_request`] or dropped, so nobody else can be admitted on the
/// strength of a slot we are about to use.
#[must_use = "an admission that is never recorded does not count against the limit"]
pub struct Admission<'a> {
    request_log: MutexGuard<'a, VecDeque<Instant>>,
}

impl Admission<'_> {
    pub fn record_request(mut self) {
        self.request_log.push_back(Instant::now());
    }
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            request_log: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Waits until fewer than `limit` requests remain in the trailing window.
    pub async fn admit_request(&self) -> Admission<'_> {
        let mut log = self.request_log.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = log.front() {
                if now.duration_since(oldest) >= self.window {
                    log.pop_front();
                } else {
                    break;
                }
            }

            if log.len() < self.limit {
                tracing::trace!(
                    in_window = log.len(),
                    window_secs = self.window.as_secs(),
                    "request allowed"
                );
                return Admission { request_log: log };
            }

            let until_slot_frees = log
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(RECHECK_INTERVAL);
            tracing::debug!(
                in_window = log.len(),
                window_secs = self.window.as_secs(),
                "request limit reached, waiting"
            );
            tokio::time::sleep(until_slot_frees.min(RECHECK_INTERVAL)).await;
        }
    }

    /// Number of recorded requests still inside the window.
    pub async fn requests_in_window(&self) -> usize {
        let log = self.request_log.lock().await;
        let now = Instant::now();
        log.iter()
            .filter(|&&at| now.duration_since(at) < self.window)
            .count()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(REQUEST_LIMIT, TIME_WINDOW)
    }
}
