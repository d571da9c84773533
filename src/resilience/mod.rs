//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → rate_limit.rs (token bucket, suspend until a token is free)
//!     → circuit_breaker.rs (fail fast while the downstream is down)
//!     → retries.rs (retry transient failures with backoff.rs delays)
//!     → operation
//! pipeline.rs composes the three; error.rs classifies failures.
//! ```
//!
//! # Design Decisions
//! - Only transient kinds are retried or counted by the breaker
//! - Fatal errors pass through every layer untouched
//! - Each primitive owns its synchronization; no shared global state
//! - All waits are tokio timers, so callers can cancel by dropping the future

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod pipeline;
pub mod rate_limit;
pub mod retries;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use error::{CircuitOpen, Classify, ErrorKind, Outcome, ServiceError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use retries::RetryPolicy;
