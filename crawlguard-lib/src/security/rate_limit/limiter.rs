//! Fixed-window rate limiter.
//!
//! Each key owns one window `{count, reset_at}`. The first request of a key,
//! or the first one at or after `reset_at`, opens a fresh window with a count
//! of one. Later requests in the same window increment the count and are
//! limited once it exceeds the maximum.

use ahash::AHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::telemetry::Metrics;

/// How often expired windows are swept, independent of the window length.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed to proceed.
    Allowed {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Number of requests remaining in the current window
        remaining: u32,
    },
    /// Request is rate limited and should be rejected.
    Limited {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Time until the window resets
        reset_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateLimitResult::Allowed { limit, .. } => *limit,
            RateLimitResult::Limited { limit, .. } => *limit,
        }
    }

    /// Get the reset duration if limited.
    pub fn reset_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { reset_after, .. } => Some(*reset_after),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-key fixed-window counter.
///
/// Every read and write of the window map, cleanup included, happens under
/// one mutex owned by this instance.
pub struct RateLimiter {
    windows: Mutex<AHashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    /// Allow `max_requests` requests per key in every `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { windows: Mutex::new(AHashMap::new()), max_requests, window }
    }

    /// Record a request for `key` and report whether it is over the limit.
    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    /// `true` when the request pushes `key` past the limit.
    pub fn is_exceeded(&self, key: &str) -> bool {
        self.check(key).is_limited()
    }

    pub(crate) fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let current = match windows.get_mut(key) {
            Some(w) if now < w.reset_at => {
                w.count = w.count.saturating_add(1);
                *w
            }
            Some(w) => {
                *w = Window { count: 1, reset_at: now + self.window };
                *w
            }
            None => {
                let w = Window { count: 1, reset_at: now + self.window };
                windows.insert(key.to_string(), w);
                w
            }
        };

        if current.count > self.max_requests {
            RateLimitResult::Limited {
                limit: self.max_requests,
                reset_after: current.reset_at.saturating_duration_since(now),
            }
        } else {
            RateLimitResult::Allowed {
                limit: self.max_requests,
                remaining: self.max_requests - current.count,
            }
        }
    }

    /// Drop every window that has expired. Returns the number of keys left.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub(crate) fn cleanup_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, w| now < w.reset_at);
        let after = windows.len();
        if before != after {
            debug!(removed = before - after, remaining = after, "Rate limiter cleanup");
        }
        after
    }

    /// Number of keys currently tracked, expired or not.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Sweep expired windows every `period` until `cancel` fires.
    pub async fn run_cleanup(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
        metrics: Option<Arc<Metrics>>,
    ) {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Rate limiter cleanup received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let remaining = self.cleanup();
                    if let Some(m) = &metrics {
                        m.record_rate_limit_keys(remaining as u64);
                    }
                }
            }
        }
    }
}
