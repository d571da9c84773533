//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured, via the `tracing` macros)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout/stderr, pretty or JSON)
//!     → whatever metrics recorder the host installs
//! ```
//!
//! Collaborators may also read `stats()` on both caches and `state()` on a
//! circuit breaker directly.

pub mod logging;
pub mod metrics;
