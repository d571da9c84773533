//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, delays ordered, rates positive)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{CoreConfig, LruCacheConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint of `config`.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_lru("meta_cache", &config.meta_cache, &mut errors);
    validate_lru("deck_cache", &config.deck_cache, &mut errors);

    if config.persistent.directory.trim().is_empty() {
        errors.push(ValidationError::new("persistent.directory", "must not be empty"));
    }

    if config.sweeper.enabled && config.sweeper.interval_secs == 0 {
        errors.push(ValidationError::new("sweeper.interval_secs", "must be > 0 when enabled"));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be >= 1"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            format!("{} exceeds max_delay_ms {}", retry.base_delay_ms, retry.max_delay_ms),
        ));
    }
    if !retry.exponential_base.is_finite() || retry.exponential_base < 1.0 {
        errors.push(ValidationError::new("retry.exponential_base", "must be finite and >= 1.0"));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be >= 1"));
    }
    if config.circuit_breaker.counted_kinds.is_empty() {
        errors.push(ValidationError::new(
            "circuit_breaker.counted_kinds",
            "must name at least one error kind",
        ));
    }

    let rps = config.rate_limit.requests_per_second;
    if !rps.is_finite() || rps <= 0.0 {
        errors.push(ValidationError::new("rate_limit.requests_per_second", "must be > 0"));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be >= 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_lru(section: &str, config: &LruCacheConfig, errors: &mut Vec<ValidationError>) {
    if config.capacity == 0 {
        errors.push(ValidationError::new(&format!("{}.capacity", section), "must be > 0"));
    }
}
