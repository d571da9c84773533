//! Error taxonomy shared by the retry, circuit breaker and rate limiter layers.
//!
//! # Kinds
//! - Transient: RateLimited, NetworkFailure, ServiceUnavailable, Timeout,
//!   ConnectionRefused. Eligible for retry, counted by the circuit breaker.
//! - Fatal: malformed input, programming errors. Never retried.
//!
//! Callers bring their own error type and implement [`Classify`] for it, or use
//! [`ServiceError`] directly.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::rate_limit::RateLimitError;

/// Abstract kind of a failed outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    NetworkFailure,
    ServiceUnavailable,
    Timeout,
    ConnectionRefused,
    Fatal,
}

impl ErrorKind {
    /// The kinds retried and counted by default.
    pub const TRANSIENT: [ErrorKind; 5] = [
        ErrorKind::RateLimited,
        ErrorKind::NetworkFailure,
        ErrorKind::ServiceUnavailable,
        ErrorKind::Timeout,
        ErrorKind::ConnectionRefused,
    ];

    /// True for every kind except `Fatal`.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Fatal)
    }

    /// Collapse the kind into what a collaborator is allowed to observe.
    pub fn outcome(self) -> Outcome {
        match self {
            ErrorKind::RateLimited => Outcome::RateLimited,
            ErrorKind::Fatal => Outcome::Fatal,
            _ => Outcome::ServiceUnavailable,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// The three failure outcomes visible outside the resilience layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    RateLimited,
    ServiceUnavailable,
    Fatal,
}

/// Reports the [`ErrorKind`] of an error.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Rejection produced by an OPEN circuit breaker.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker '{breaker}' is open, retry after {retry_after:?}")]
pub struct CircuitOpen {
    /// Name of the breaker that rejected the call.
    pub breaker: String,
    /// Time remaining until the breaker admits a trial call.
    pub retry_after: Duration,
}

impl Classify for CircuitOpen {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ServiceUnavailable
    }
}

/// General-purpose error for outbound calls.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The remote side (or a local limiter) refused for rate reasons.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network failure: {0}")]
    Network(String),

    /// Remote service temporarily unavailable (5xx and friends).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    /// Non-retryable failure (bad input, bug).
    #[error("{0}")]
    Fatal(String),
}

impl ServiceError {
    /// The outcome a collaborator observes for this error.
    pub fn outcome(&self) -> Outcome {
        self.kind().outcome()
    }
}

impl Classify for ServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::RateLimited(_) => ErrorKind::RateLimited,
            ServiceError::Network(_) => ErrorKind::NetworkFailure,
            ServiceError::ServiceUnavailable(_) | ServiceError::CircuitOpen(_) => {
                ErrorKind::ServiceUnavailable
            }
            ServiceError::Timeout(_) => ErrorKind::Timeout,
            ServiceError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            ServiceError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::TimedOut => ServiceError::Timeout(Duration::ZERO),
            Io::ConnectionRefused => ServiceError::ConnectionRefused(err.to_string()),
            Io::ConnectionReset | Io::ConnectionAborted | Io::BrokenPipe | Io::NotConnected => {
                ServiceError::Network(err.to_string())
            }
            _ => ServiceError::Fatal(err.to_string()),
        }
    }
}

impl From<RateLimitError> for ServiceError {
    fn from(err: RateLimitError) -> Self {
        ServiceError::RateLimited(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServiceError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ServiceError::Timeout(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        for kind in ErrorKind::TRANSIENT {
            assert!(kind.is_transient());
        }
        assert!(!ErrorKind::Fatal.is_transient());
    }

    #[test]
    fn test_outcome_collapses_to_three() {
        assert_eq!(ErrorKind::RateLimited.outcome(), Outcome::RateLimited);
        assert_eq!(ErrorKind::Timeout.outcome(), Outcome::ServiceUnavailable);
        assert_eq!(ErrorKind::ConnectionRefused.outcome(), Outcome::ServiceUnavailable);
        assert_eq!(ErrorKind::Fatal.outcome(), Outcome::Fatal);
    }

    #[test]
    fn test_circuit_open_is_service_unavailable() {
        let err: ServiceError = CircuitOpen {
            breaker: "scryfall".into(),
            retry_after: Duration::from_secs(5),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert!(err.to_string().contains("scryfall"));
    }

    #[test]
    fn test_io_error_mapping() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(ServiceError::from(refused).kind(), ErrorKind::ConnectionRefused);

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(ServiceError::from(reset).kind(), ErrorKind::NetworkFailure);

        let other = std::io::Error::new(std::io::ErrorKind::InvalidData, "garbage");
        assert_eq!(ServiceError::from(other).outcome(), Outcome::Fatal);
    }
}
