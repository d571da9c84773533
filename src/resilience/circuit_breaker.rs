//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: a single trial call tests if the downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first call after recovery_timeout since the last failure
//! Half-Open → Closed: trial call succeeds (failure_count reset)
//! Half-Open → Open: trial call fails (last_failure_at updated)
//! ```
//!
//! # Design Decisions
//! - One breaker per downstream (not global)
//! - Fail fast in Open state with a [`CircuitOpen`] error
//! - Single trial call in Half-Open; concurrent callers are rejected while it runs
//! - Only configured error kinds count; other errors leave the state untouched
//! - A trial call that is dropped before completing frees the trial slot

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::{CircuitOpen, Classify, ErrorKind};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

/// A three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    counted: Vec<ErrorKind>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker counting the transient error kinds.
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        let name = name.into();
        tracing::debug!(
            breaker = %name,
            failure_threshold,
            recovery_timeout_ms = recovery_timeout.as_millis() as u64,
            "Circuit breaker initialized"
        );
        Self {
            name,
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            counted: ErrorKind::TRANSIENT.to_vec(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Create a breaker from its config section.
    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            Duration::from_secs(config.recovery_timeout_secs),
        )
        .with_counted(config.counted_kinds.iter().copied())
    }

    /// Replace the error kinds counted as failures.
    pub fn with_counted(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.counted = kinds.into_iter().collect();
        self
    }

    /// Name used in logs, metrics and rejections.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive counted failures.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Time left before an open breaker admits a trial call, `None` unless open.
    pub fn retry_after(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.state != CircuitState::Open {
            return None;
        }
        Some(self.remaining_cooldown(&inner))
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.trial_in_flight = false;
        metrics::record_breaker_state(&self.name, CircuitState::Closed);
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset");
    }

    /// Execute `operation` under breaker protection.
    ///
    /// Rejected calls never invoke `operation` and return `E::from(CircuitOpen)`.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + From<CircuitOpen>,
    {
        let admission = self.admit()?;
        let result = operation().await;
        match &result {
            Ok(_) => admission.succeeded(),
            Err(err) if self.counted.contains(&err.kind()) => admission.failed(err.kind()),
            Err(_) => admission.ignored(),
        }
        result
    }

    fn admit(&self) -> Result<Admission<'_>, CircuitOpen> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::new(self, false)),
            CircuitState::Open => {
                let remaining = self.remaining_cooldown(&inner);
                if remaining.is_zero() {
                    tracing::info!(breaker = %self.name, "Circuit breaker entering HALF_OPEN state");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    metrics::record_breaker_state(&self.name, CircuitState::HalfOpen);
                    Ok(Admission::new(self, true))
                } else {
                    Err(self.reject(remaining))
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // Outcome of the running trial decides the wait.
                    Err(self.reject(Duration::ZERO))
                } else {
                    inner.trial_in_flight = true;
                    Ok(Admission::new(self, true))
                }
            }
        }
    }

    fn reject(&self, retry_after: Duration) -> CircuitOpen {
        tracing::debug!(breaker = %self.name, ?retry_after, "Call rejected, circuit open");
        metrics::record_breaker_rejection(&self.name);
        CircuitOpen {
            breaker: self.name.clone(),
            retry_after,
        }
    }

    fn remaining_cooldown(&self, inner: &BreakerState) -> Duration {
        match inner.last_failure_at {
            Some(at) => self.recovery_timeout.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen if trial => {
                tracing::info!(breaker = %self.name, "Circuit breaker entering CLOSED state (service recovered)");
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                metrics::record_breaker_state(&self.name, CircuitState::Closed);
            }
            CircuitState::Closed => inner.failure_count = 0,
            // Late success from a call admitted before the breaker opened.
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool, kind: ErrorKind) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());
        tracing::warn!(
            breaker = %self.name,
            kind = %kind,
            failures = inner.failure_count,
            threshold = self.failure_threshold,
            "Circuit breaker recorded failure"
        );

        let reopen = match inner.state {
            CircuitState::HalfOpen => trial,
            CircuitState::Closed => inner.failure_count >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if trial {
            inner.trial_in_flight = false;
        }
        if reopen {
            tracing::error!(
                breaker = %self.name,
                failures = inner.failure_count,
                "Circuit breaker entering OPEN state"
            );
            inner.state = CircuitState::Open;
            metrics::record_breaker_state(&self.name, CircuitState::Open);
        }
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}

/// A call admitted through the breaker.
///
/// Dropping it without reporting an outcome (cancelled caller) frees the
/// half-open trial slot and leaves the counters alone.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn succeeded(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    fn failed(mut self, kind: ErrorKind) {
        self.settled = true;
        self.breaker.on_failure(self.trial, kind);
    }

    fn ignored(self) {}
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
