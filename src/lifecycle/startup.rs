//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the shared caches and resilience primitives once
//! - Start background sweepers
//! - Tear everything down on shutdown
//!
//! # Design Decisions
//! - Fail fast: an invalid config or unusable cache directory is fatal
//! - One [`CoreServices`] per process, passed by `Arc` to every consumer;
//!   there is no global instance

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::{CacheStats, LruCache, PersistentCache, Sweeper};
use crate::config::schema::CoreConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::lifecycle::shutdown::Shutdown;
use crate::resilience::{CircuitBreaker, CircuitState, Pipeline, RateLimiter, RetryPolicy};

/// How long `shutdown` waits for background tasks before giving up on them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ValidationError>),

    #[error("cannot open persistent cache at '{directory}': {source}")]
    PersistentCache {
        directory: String,
        #[source]
        source: std::io::Error,
    },
}

/// Observability snapshot of every shared component.
#[derive(Debug, Clone, Serialize)]
pub struct ServicesStats {
    pub meta_cache: CacheStats,
    pub deck_cache: CacheStats,
    pub persistent: CacheStats,
    pub circuit_breaker: CircuitState,
    pub rate_limit_tokens: f64,
}

/// Process-wide handle to the caching and resilience core.
#[derive(Debug)]
pub struct CoreServices {
    config: CoreConfig,
    meta_cache: Arc<LruCache<Value>>,
    deck_cache: Arc<LruCache<Value>>,
    persistent: Arc<PersistentCache>,
    rate_limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CoreServices {
    /// Build every component from `config`. Does not spawn anything.
    pub fn build(config: CoreConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(StartupError::Config)?;

        let persistent = PersistentCache::from_config(&config.persistent).map_err(|source| {
            StartupError::PersistentCache {
                directory: config.persistent.directory.clone(),
                source,
            }
        })?;

        let services = Self {
            meta_cache: Arc::new(LruCache::from_config("meta", &config.meta_cache)),
            deck_cache: Arc::new(LruCache::from_config("deck", &config.deck_cache)),
            persistent: Arc::new(persistent),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            breaker: Arc::new(CircuitBreaker::from_config("upstream", &config.circuit_breaker)),
            retry: RetryPolicy::from_config(&config.retry),
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
            config,
        };

        tracing::info!(
            meta_capacity = services.meta_cache.capacity(),
            deck_capacity = services.deck_cache.capacity(),
            persistent_dir = %services.persistent.directory().display(),
            "Core services initialized"
        );
        Ok(services)
    }

    /// Spawn the cache sweepers. Must be called inside a tokio runtime.
    pub fn start(&self) {
        if !self.config.sweeper.enabled {
            tracing::info!("Cache sweepers disabled");
            return;
        }
        let interval = Duration::from_secs(self.config.sweeper.interval_secs);
        let mut tasks = self.tasks.lock().expect("task list mutex poisoned");

        for cache in [self.meta_cache.clone(), self.deck_cache.clone()] {
            let name = cache.name().to_string();
            let sweeper = Sweeper::new(name, interval, move || {
                let cache = cache.clone();
                async move { cache.cleanup_expired() }
            });
            tasks.push(tokio::spawn(sweeper.run(self.shutdown.subscribe())));
        }

        let persistent = self.persistent.clone();
        let sweeper = Sweeper::new("persistent", interval, move || {
            let persistent = persistent.clone();
            async move { persistent.cleanup_expired().await }
        });
        tasks.push(tokio::spawn(sweeper.run(self.shutdown.subscribe())));
    }

    /// Signal background tasks and wait for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .expect("task list mutex poisoned")
            .drain(..)
            .collect();

        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Background task failed"),
                Err(_) => tracing::warn!("Background task did not stop within grace period"),
            }
        }
        tracing::info!("Core services shut down");
    }

    /// The validated configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// In-memory cache for meta lookups.
    pub fn meta_cache(&self) -> &Arc<LruCache<Value>> {
        &self.meta_cache
    }

    /// In-memory cache for deck analyses.
    pub fn deck_cache(&self) -> &Arc<LruCache<Value>> {
        &self.deck_cache
    }

    /// Shared on-disk cache.
    pub fn persistent_cache(&self) -> &Arc<PersistentCache> {
        &self.persistent
    }

    /// Breaker guarding the upstream service.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Limiter shared by every pipeline.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// The standard chain over the shared limiter and breaker.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::builder()
            .rate_limiter(self.rate_limiter.clone())
            .circuit_breaker(self.breaker.clone())
            .retry(self.retry.clone())
            .build()
    }

    /// Snapshot of every shared component.
    pub async fn stats(&self) -> ServicesStats {
        ServicesStats {
            meta_cache: self.meta_cache.stats(),
            deck_cache: self.deck_cache.stats(),
            persistent: self.persistent.stats().await,
            circuit_breaker: self.breaker.state(),
            rate_limit_tokens: self.rate_limiter.available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_in(dir: &tempfile::TempDir) -> CoreConfig {
        let mut config = CoreConfig::default();
        config.persistent.directory = dir.path().join("cache").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_build_start_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let services = CoreServices::build(config_in(&dir)).unwrap();
        services.start();
        assert_eq!(services.shutdown.receiver_count(), 3);

        services.meta_cache().set("standard", json!({"top": "Domain Ramp"}));
        services.persistent_cache().set("card:Opt", &json!("Scry 1")).await;

        let stats = services.stats().await;
        assert_eq!(stats.meta_cache.size, 1);
        assert_eq!(stats.meta_cache.capacity, Some(100));
        assert_eq!(stats.deck_cache.capacity, Some(500));
        assert_eq!(stats.persistent.size, 1);
        assert_eq!(stats.circuit_breaker, CircuitState::Closed);

        services.shutdown().await;
        assert_eq!(services.shutdown.receiver_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.deck_cache.capacity = 0;
        let err = CoreServices::build(config).unwrap_err();
        assert!(matches!(err, StartupError::Config(_)));
        assert!(err.to_string().contains("deck_cache.capacity"));
    }

    #[test]
    fn test_unusable_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let mut config = CoreConfig::default();
        config.persistent.directory = blocker.join("cache").to_string_lossy().into_owned();
        assert!(matches!(
            CoreServices::build(config),
            Err(StartupError::PersistentCache { .. })
        ));
    }
}
