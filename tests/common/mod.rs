//! Shared utilities for integration and load testing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resilient_cache::{CoreConfig, RetryPolicy, ServiceError};

/// A programmable upstream service that counts invocations.
///
/// `respond` receives the zero-based call number.
pub struct MockService<F> {
    calls: AtomicU32,
    respond: F,
}

impl<F, T> MockService<F>
where
    F: Fn(u32) -> Result<T, ServiceError>,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            respond,
        })
    }

    pub async fn call(&self) -> Result<T, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        (self.respond)(n)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Fails with a network error `failures` times, then returns `value`.
#[allow(dead_code)]
pub fn flaky(
    failures: u32,
    value: &'static str,
) -> Arc<MockService<impl Fn(u32) -> Result<String, ServiceError>>> {
    MockService::new(move |n| {
        if n < failures {
            Err(ServiceError::Network(format!("connection reset (call {})", n)))
        } else {
            Ok(value.to_string())
        }
    })
}

/// A service whose health can be toggled from the test.
#[allow(dead_code)]
pub struct Switch(AtomicBool);

#[allow(dead_code)]
impl Switch {
    pub fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(healthy)))
    }

    pub fn set(&self, healthy: bool) {
        self.0.store(healthy, Ordering::SeqCst);
    }

    pub fn respond(&self) -> Result<String, ServiceError> {
        if self.0.load(Ordering::SeqCst) {
            Ok("ok".to_string())
        } else {
            Err(ServiceError::ServiceUnavailable("503".to_string()))
        }
    }
}

/// Retry policy with short, deterministic delays.
#[allow(dead_code)]
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(100), Duration::from_secs(1))
}

/// Default config pointed at a temporary cache directory.
#[allow(dead_code)]
pub fn config_in(dir: &tempfile::TempDir) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.persistent.directory = dir.path().join("cache").to_string_lossy().into_owned();
    config
}
