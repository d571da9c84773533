//! Caching and resilience core.
//!
//! In-memory LRU caches with TTL, a file-backed persistent cache, and the
//! resilience chain (rate limiter → circuit breaker → retry) that wraps every
//! call to a rate-limited, unreliable upstream service.

pub mod cache;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cache::{CacheKey, CacheStats, LruCache, PersistentCache};
pub use config::schema::CoreConfig;
pub use lifecycle::{CoreServices, Shutdown};
pub use resilience::{
    CircuitBreaker, CircuitOpen, CircuitState, Classify, ErrorKind, Pipeline, RateLimiter,
    RetryPolicy, ServiceError,
};
