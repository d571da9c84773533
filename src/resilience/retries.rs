//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is retryable (by [`ErrorKind`])
//! - Re-invoke the operation with exponential backoff + jitter
//! - Propagate the last failure once attempts are exhausted
//!
//! # Design Decisions
//! - Stateless: a policy can be shared by any number of concurrent callers
//! - Fatal errors are never retried and never wrapped
//! - Backoff sleeps on the tokio timer; dropping the future cancels the wait

use std::future::Future;
use std::time::Duration;

use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::error::{Classify, ErrorKind};

/// Retry policy for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
    retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a policy retrying the transient kinds, without jitter.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            exponential_base: 2.0,
            jitter: false,
            retryable: ErrorKind::TRANSIENT.to_vec(),
        }
    }

    /// Create a policy from its config section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            exponential_base: config.exponential_base,
            jitter: config.jitter,
            retryable: config.retryable_kinds.clone(),
        }
    }

    /// Set the growth factor between delays.
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the set of kinds that trigger a retry.
    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    /// Total invocations allowed, first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether `kind` triggers another attempt.
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Delay to wait after the failed attempt with index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay,
            self.max_delay,
            self.exponential_base,
            self.jitter,
        )
    }

    /// Run `operation` under this policy.
    ///
    /// Returns the first success, the first non-retryable error, or the last
    /// retryable error after `max_attempts` invocations.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let kind = err.kind();
            if !self.is_retryable(kind) {
                tracing::error!(kind = %kind, error = %err, "Non-retryable error");
                return Err(err);
            }

            if attempt + 1 >= self.max_attempts {
                tracing::error!(
                    attempts = self.max_attempts,
                    kind = %kind,
                    error = %err,
                    "All attempts failed"
                );
                return Err(err);
            }

            let delay = self.delay(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                max_attempts = self.max_attempts,
                kind = %kind,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying"
            );
            metrics::record_retry(kind);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
