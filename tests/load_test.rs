//! Concurrency tests: many tasks sharing one chain and one cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use resilient_cache::{CircuitBreaker, CircuitState, LruCache, Pipeline, RateLimiter};

mod common;

#[tokio::test(start_paused = true)]
async fn test_shared_limiter_bounds_throughput() {
    const TASKS: u32 = 30;
    let service = common::flaky(0, "ok");
    let pipeline = Pipeline::builder()
        .rate_limiter(Arc::new(RateLimiter::new(100.0, 10)))
        .circuit_breaker(Arc::new(CircuitBreaker::new("upstream", 5, Duration::from_secs(60))))
        .retry(common::fast_retry(3))
        .build();

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let pipeline = pipeline.clone();
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .call(|| {
                    let service = service.clone();
                    async move { service.call().await }
                })
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "ok");
    }

    // 10 from the burst, 20 more at 100/s.
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(195),
        "Limiter let calls through too fast: {:?}",
        elapsed
    );
    assert_eq!(service.calls(), TASKS);
    assert_eq!(
        pipeline.circuit_breaker().unwrap().state(),
        CircuitState::Closed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_under_concurrent_load() {
    let cache = Arc::new(LruCache::new("deck", 50, Duration::from_secs(60)));
    let mut handles = Vec::new();

    for worker in 0..8u32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..500u32 {
                let key = format!("deck:{}", (worker * 31 + i) % 120);
                if cache.get(&key).is_none() {
                    cache.set(key, i);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats();
    assert!(stats.size <= 50, "Capacity exceeded: {}", stats.size);
    assert_eq!(stats.hits + stats.misses, 8 * 500);
}
