//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoreConfig (validated, immutable)
//!     → handed to lifecycle::startup to build the shared services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Every primitive can also be built from explicit parameters

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::CoreConfig;
pub use schema::{
    CircuitBreakerConfig, LruCacheConfig, PersistentCacheConfig, RateLimitConfig, RetryConfig,
};
