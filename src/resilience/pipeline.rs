//! Composition of the resilience layers around one outbound operation.
//!
//! ```text
//! caller
//!   → RateLimiter   (wait for a token)
//!   → CircuitBreaker (fail fast while open)
//!   → RetryPolicy   (re-invoke on transient failure)
//!   → operation
//! ```
//!
//! Every layer is optional. Limiters and breakers are shared through `Arc`
//! so several pipelines may protect the same downstream.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::error::{CircuitOpen, Classify};
use crate::resilience::rate_limit::{RateLimitError, RateLimiter};
use crate::resilience::retries::RetryPolicy;

/// A composed protection chain.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    rate_limiter: Option<Arc<RateLimiter>>,
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<RetryPolicy>,
    tokens: u32,
}

impl Pipeline {
    /// Start building a pipeline with no layers.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The breaker layer, if any.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// The limiter layer, if any.
    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    /// Run `operation` through the chain.
    ///
    /// Failures surface as the caller's error type: the last transient error
    /// after retries, a [`CircuitOpen`] rejection, a [`RateLimitError`], or a
    /// fatal error untouched.
    pub async fn call<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + From<CircuitOpen> + From<RateLimitError> + Display,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire(self.tokens.max(1)).await?;
        }

        let retry = self.retry.as_ref();
        let protected = async move {
            match retry {
                Some(policy) => policy.run(operation).await,
                None => operation().await,
            }
        };

        match &self.breaker {
            Some(breaker) => breaker.call(|| protected).await,
            None => protected.await,
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    inner: Pipeline,
}

impl PipelineBuilder {
    /// Throttle calls through `limiter`.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.inner.rate_limiter = Some(limiter);
        self
    }

    /// Tokens taken from the limiter per call (default 1).
    pub fn tokens_per_call(mut self, tokens: u32) -> Self {
        self.inner.tokens = tokens;
        self
    }

    /// Guard calls with `breaker`.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.inner.breaker = Some(breaker);
        self
    }

    /// Retry transient failures under `policy`.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.inner.retry = Some(policy);
        self
    }

    /// Finish the pipeline.
    pub fn build(self) -> Pipeline {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::error::{Outcome, ServiceError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_pipeline_is_passthrough() {
        let pipeline = Pipeline::builder().build();
        let value: Result<&str, ServiceError> = pipeline.call(|| async { Ok("ok") }).await;
        assert_eq!(value.unwrap(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_count_once_toward_breaker() {
        let breaker = Arc::new(CircuitBreaker::new("mtgjson", 2, Duration::from_secs(60)));
        let pipeline = Pipeline::builder()
            .circuit_breaker(breaker.clone())
            .retry(RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50)))
            .build();

        let calls = AtomicU32::new(0);
        let result: Result<(), ServiceError> = pipeline
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::Network("reset".into())) }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_retries() {
        let breaker = Arc::new(CircuitBreaker::new("mtgjson", 1, Duration::from_secs(60)));
        let pipeline = Pipeline::builder()
            .circuit_breaker(breaker.clone())
            .retry(RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(50)))
            .build();

        let _: Result<(), ServiceError> = pipeline
            .call(|| async { Err(ServiceError::Timeout(Duration::from_secs(30))) })
            .await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let err = pipeline
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ServiceError>(()) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(err.outcome(), Outcome::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_oversized_token_request_is_rate_limited() {
        let pipeline = Pipeline::builder()
            .rate_limiter(Arc::new(RateLimiter::new(5.0, 2)))
            .tokens_per_call(3)
            .build();
        let err = pipeline
            .call(|| async { Ok::<_, ServiceError>(()) })
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), Outcome::RateLimited);
    }
}
