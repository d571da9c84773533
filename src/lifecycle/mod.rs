//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build caches + resilience primitives → Spawn sweepers
//!
//! Shutdown (shutdown.rs):
//!     trigger() → sweepers exit their loops → CoreServices::shutdown returns
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then components, then background tasks
//! - Shutdown has a grace period per task

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{CoreServices, ServicesStats, StartupError};
