//! Token bucket rate limiting for outbound calls.
//!
//! # Responsibilities
//! - Bound call rate to `requests_per_second` with `burst` capacity
//! - Suspend callers until enough tokens are available
//!
//! # Design Decisions
//! - Token arithmetic happens under a short `std::sync::Mutex`; nothing sleeps
//!   while holding it
//! - Waiters queue on a fair `tokio::sync::Mutex` so a waiter is not overtaken
//!   by callers arriving during its sleep
//! - Tokens are only deducted when granted: a cancelled waiter owes nothing
//! - After waking, availability is re-checked before granting

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::schema::RateLimitConfig;
use crate::observability::metrics;
use crate::resilience::error::{Classify, ErrorKind};

/// Errors returned when a request cannot be granted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RateLimitError {
    /// The request is larger than the bucket can ever hold.
    #[error("requested {requested} tokens but bucket capacity is {capacity}")]
    ExceedsCapacity { requested: u32, capacity: u32 },

    /// Granting the request would take longer than the caller allows.
    #[error("rate limited: would wait {wait:?}, limit {max_wait:?}")]
    WouldExceedDeadline { wait: Duration, max_wait: Duration },
}

impl Classify for RateLimitError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::RateLimited
    }
}

/// A token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    /// Take `n` tokens, or report how long until they would be available.
    fn try_take(&mut self, n: f64, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        self.refill(capacity, refill_rate);
        if self.tokens >= n {
            self.tokens -= n;
            Ok(())
        } else {
            // A near-zero rate yields waits beyond what Duration can hold.
            let secs = (n - self.tokens) / refill_rate;
            Err(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        }
    }
}

/// Shared token bucket throttle.
#[derive(Debug)]
pub struct RateLimiter {
    refill_rate: f64,
    capacity: u32,
    bucket: Mutex<TokenBucket>,
    queue: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    /// Create a limiter refilling `requests_per_second` tokens per second,
    /// holding at most `burst` (and starting full).
    ///
    /// A non-positive rate is clamped to a tiny positive value and `burst`
    /// to at least one token.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let capacity = burst.max(1);
        let refill_rate = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            requests_per_second
        } else {
            f64::MIN_POSITIVE
        };
        Self {
            refill_rate,
            capacity,
            bucket: Mutex::new(TokenBucket::new(capacity as f64)),
            queue: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a limiter from its config section.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Burst size.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Tokens currently available (after refill).
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        bucket.refill(self.capacity as f64, self.refill_rate);
        bucket.tokens
    }

    /// Take `n` tokens if available right now.
    pub fn try_acquire(&self, n: u32) -> bool {
        if n > self.capacity {
            return false;
        }
        self.lock()
            .try_take(n as f64, self.capacity as f64, self.refill_rate)
            .is_ok()
    }

    /// Wait until `n` tokens are available and take them.
    pub async fn acquire(&self, n: u32) -> Result<(), RateLimitError> {
        self.acquire_inner(n, None).await
    }

    /// Like [`acquire`](Self::acquire), but fail with
    /// [`RateLimitError::WouldExceedDeadline`] instead of waiting past `max_wait`.
    pub async fn acquire_within(&self, n: u32, max_wait: Duration) -> Result<(), RateLimitError> {
        self.acquire_inner(n, Some(max_wait)).await
    }

    async fn acquire_inner(&self, n: u32, max_wait: Option<Duration>) -> Result<(), RateLimitError> {
        if n > self.capacity {
            return Err(RateLimitError::ExceedsCapacity {
                requested: n,
                capacity: self.capacity,
            });
        }

        // Fast path: nobody queued and tokens on hand.
        if let Ok(_turn) = self.queue.try_lock() {
            if self.try_take(n).is_ok() {
                return Ok(());
            }
        }

        let started = Instant::now();
        let _turn = match max_wait {
            Some(max_wait) => match tokio::time::timeout(max_wait, self.queue.lock()).await {
                Ok(turn) => turn,
                Err(_) => {
                    tracing::debug!(?max_wait, "Rate limit queue wait exceeds deadline");
                    return Err(RateLimitError::WouldExceedDeadline {
                        wait: started.elapsed(),
                        max_wait,
                    });
                }
            },
            None => self.queue.lock().await,
        };
        loop {
            let wait = match self.try_take(n) {
                Ok(()) => {
                    let waited = started.elapsed();
                    if !waited.is_zero() {
                        metrics::record_rate_limit_wait(waited);
                    }
                    return Ok(());
                }
                Err(wait) => wait,
            };

            if let Some(max_wait) = max_wait {
                let total = started.elapsed().saturating_add(wait);
                if total > max_wait {
                    tracing::debug!(?wait, ?max_wait, "Rate limit wait exceeds deadline");
                    return Err(RateLimitError::WouldExceedDeadline {
                        wait: total,
                        max_wait,
                    });
                }
            }

            tracing::debug!(wait_ms = wait.as_millis() as u64, tokens = n, "Rate limit: waiting");
            tokio::time::sleep(wait).await;
        }
    }

    fn try_take(&self, n: u32) -> Result<(), Duration> {
        self.lock()
            .try_take(n as f64, self.capacity as f64, self.refill_rate)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TokenBucket> {
        self.bucket.lock().expect("rate limiter mutex poisoned")
    }
}
