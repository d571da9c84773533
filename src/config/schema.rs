//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the caching
//! and resilience core. All types derive Serde traits for deserialization
//! from config files, and every field has a default.

use serde::{Deserialize, Serialize};

use crate::resilience::error::ErrorKind;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// In-memory cache for meta intelligence lookups.
    pub meta_cache: LruCacheConfig,

    /// In-memory cache for deck analyses.
    pub deck_cache: LruCacheConfig,

    /// On-disk cache for long-lived results.
    pub persistent: PersistentCacheConfig,

    /// Periodic expiration sweep.
    pub sweeper: SweeperConfig,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            meta_cache: LruCacheConfig {
                capacity: 100,
                default_ttl_secs: 3600,
            },
            deck_cache: LruCacheConfig {
                capacity: 500,
                default_ttl_secs: 1800,
            },
            persistent: PersistentCacheConfig::default(),
            sweeper: SweeperConfig::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// In-memory LRU cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LruCacheConfig {
    /// Maximum number of entries.
    pub capacity: usize,

    /// TTL applied when `set` is given none. 0 = never expire.
    pub default_ttl_secs: u64,
}

impl Default for LruCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_ttl_secs: 3600,
        }
    }
}

/// Disk-backed cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistentCacheConfig {
    /// Directory holding one file per key (created if missing).
    pub directory: String,

    /// TTL applied when `set` is given none. 0 = never expire.
    pub default_ttl_secs: u64,
}

impl Default for PersistentCacheConfig {
    fn default() -> Self {
        Self {
            directory: "data/cache".to_string(),
            default_ttl_secs: 86_400,
        }
    }
}

/// Background expiration sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,

    /// Seconds between sweeps.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt.
    pub exponential_base: f64,

    /// Scale each delay by a random factor in [0.5, 1.0].
    pub jitter: bool,

    /// Error kinds that trigger a retry.
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter: true,
            retryable_kinds: ErrorKind::TRANSIENT.to_vec(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures needed to open the circuit.
    pub failure_threshold: u32,

    /// Seconds after the last failure before a trial call is allowed.
    pub recovery_timeout_secs: u64,

    /// Error kinds counted as failures.
    pub counted_kinds: Vec<ErrorKind>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            counted_kinds: ErrorKind::TRANSIENT.to_vec(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens refilled per second.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // Scryfall asks for 50-100ms between requests.
            requests_per_second: 10.0,
            burst_size: 1,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
