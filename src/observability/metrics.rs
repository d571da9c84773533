//! Metrics collection.
//!
//! # Metrics
//! - `cache_hits_total` / `cache_misses_total` (counter): lookups by cache
//! - `cache_evictions_total` (counter): LRU evictions by cache
//! - `cache_entries` (gauge): current entry count by cache
//! - `retry_attempts_total` (counter): retries by error kind
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_breaker_rejections_total` (counter): fast-failed calls
//! - `rate_limit_wait_seconds` (histogram): time spent waiting for tokens
//!
//! # Design Decisions
//! - Uses the `metrics` facade only; the host process installs a recorder
//! - Without a recorder every call is a no-op

use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::error::ErrorKind;

/// Count a cache hit.
pub fn record_cache_hit(cache: &str) {
    metrics::counter!("cache_hits_total", "cache" => cache.to_string()).increment(1);
}

/// Count a cache miss.
pub fn record_cache_miss(cache: &str) {
    metrics::counter!("cache_misses_total", "cache" => cache.to_string()).increment(1);
}

/// Count an LRU eviction.
pub fn record_cache_eviction(cache: &str) {
    metrics::counter!("cache_evictions_total", "cache" => cache.to_string()).increment(1);
}

/// Report the current entry count.
pub fn record_cache_size(cache: &str, size: usize) {
    metrics::gauge!("cache_entries", "cache" => cache.to_string()).set(size as f64);
}

/// Count a retry, labelled by error kind.
pub fn record_retry(kind: ErrorKind) {
    metrics::counter!("retry_attempts_total", "kind" => kind.to_string()).increment(1);
}

/// Report a breaker state change.
pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    metrics::gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(value);
}

/// Count a call rejected by an open breaker.
pub fn record_breaker_rejection(breaker: &str) {
    metrics::counter!("circuit_breaker_rejections_total", "breaker" => breaker.to_string())
        .increment(1);
}

/// Record how long a caller waited for tokens.
pub fn record_rate_limit_wait(waited: Duration) {
    metrics::histogram!("rate_limit_wait_seconds").record(waited.as_secs_f64());
}
