//! Per-key token bucket rate limiting for outbound GitLab calls
//!
//! Each key (a session, a service account, or `"default"`) gets its own
//! bucket on first use. Buckets refill lazily from monotonic time on access;
//! no background timer runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{KeplerError, Result};

/// Default sustained rate.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default burst size.
pub const DEFAULT_BURST: u32 = 10;

// ---------------------------------------------------------------------------
// TokenBucket
// ---------------------------------------------------------------------------

/// A classic token bucket.
///
/// `tokens` never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    fill_rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Burst size
    /// * `fill_rate` - Tokens added per second
    pub fn new(capacity: f64, fill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            fill_rate,
            last_update: Instant::now(),
        }
    }

    /// Current level after a lazy refill.
    pub fn tokens(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    /// Takes `n` tokens if available; leaves the bucket untouched otherwise.
    pub fn consume(&mut self, n: f64) -> bool {
        self.refill();
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Seconds until `n` tokens are available, without changing the bucket.
    pub fn time_until_available(&self, n: f64) -> f64 {
        let projected = self.projected(Instant::now());
        if projected >= n {
            0.0
        } else {
            (n - projected) / self.fill_rate
        }
    }

    fn projected(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        (self.tokens + elapsed * self.fill_rate).min(self.capacity)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        self.tokens = self.projected(now);
        self.last_update = now;
    }
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Keyed collection of token buckets sharing one configuration.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::rate_limit::RateLimiter;
///
/// let limiter = RateLimiter::new(60, 2);
/// assert!(limiter.try_acquire("a"));
/// assert!(limiter.try_acquire("a"));
/// assert!(!limiter.try_acquire("a"));
/// assert!(limiter.try_acquire("b"));
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    burst: u32,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_BURST)
    }
}

impl RateLimiter {
    /// Creates a limiter. Zero values are raised to one.
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            burst: burst.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Configured sustained rate.
    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Configured burst size.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Tokens added per second.
    pub fn fill_rate(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    /// Takes one token for `key` if available.
    pub fn try_acquire(&self, key: &str) -> bool {
        let mut buckets = self.lock();
        self.bucket(&mut buckets, key).consume(1.0)
    }

    /// Waits until a token for `key` is available and takes it.
    ///
    /// The lock is released while sleeping, and the bucket is re-checked on
    /// wake since other callers may have drained it.
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait = match self.try_take(key) {
                None => return,
                Some(wait) => wait,
            };
            tracing::debug!(key, wait_secs = wait, "Rate limited, waiting");
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up instead of waiting past
    /// `max_wait` in total.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::RateLimited`] with the remaining wait estimate
    /// when the budget would be exceeded.
    pub async fn acquire_within(&self, key: &str, max_wait: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            let wait = match self.try_take(key) {
                None => return Ok(()),
                Some(wait) => wait,
            };

            let remaining = max_wait.saturating_sub(started.elapsed());
            if Duration::from_secs_f64(wait) > remaining {
                return Err(KeplerError::RateLimited { retry_after: wait });
            }

            tracing::debug!(key, wait_secs = wait, "Rate limited, waiting");
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }

    /// Estimated seconds until `key` can make a request. Does not consume.
    pub fn get_retry_after(&self, key: &str) -> f64 {
        self.lock()
            .get(key)
            .map(|bucket| bucket.time_until_available(1.0))
            .unwrap_or(0.0)
    }

    /// Clears one bucket, or all of them when `key` is `None`.
    pub fn reset(&self, key: Option<&str>) {
        let mut buckets = self.lock();
        match key {
            Some(key) => {
                buckets.remove(key);
            }
            None => buckets.clear(),
        }
    }

    /// Consumes a token, or returns the wait in seconds. Holds the lock only
    /// for the check.
    fn try_take(&self, key: &str) -> Option<f64> {
        let mut buckets = self.lock();
        let bucket = self.bucket(&mut buckets, key);
        if bucket.consume(1.0) {
            None
        } else {
            Some(bucket.time_until_available(1.0))
        }
    }

    fn bucket<'a>(
        &self,
        buckets: &'a mut HashMap<String, TokenBucket>,
        key: &str,
    ) -> &'a mut TokenBucket {
        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(f64::from(self.burst), self.fill_rate()))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }
}
