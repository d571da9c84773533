//! Periodic expiration sweep.
//!
//! # Responsibilities
//! - Call `cleanup_expired` on a cache at a fixed interval
//! - Stop promptly on the shutdown broadcast

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

/// Background sweeper for one cache.
pub struct Sweeper<F> {
    name: String,
    interval: Duration,
    sweep: F,
}

impl<F, Fut> Sweeper<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = usize>,
{
    /// `sweep` runs one cleanup pass and returns how many entries it removed.
    pub fn new(name: impl Into<String>, interval: Duration, sweep: F) -> Self {
        Self {
            name: name.into(),
            interval,
            sweep,
        }
    }

    /// Sweep on every tick until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            cache = %self.name,
            interval_secs = self.interval.as_secs(),
            "Cache sweeper starting"
        );

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = (self.sweep)().await;
                    tracing::debug!(cache = %self.name, removed, "Sweep finished");
                }
                _ = shutdown.recv() => {
                    tracing::info!(cache = %self.name, "Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruCache;
    use crate::lifecycle::Shutdown;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval_and_stops() {
        let cache = Arc::new(LruCache::new("meta", 10, Duration::from_secs(5)));
        cache.set("standard", 1u32);
        cache.set_with_ttl("pinned", 2u32, Duration::ZERO);

        let shutdown = Shutdown::new();
        let sweeper = {
            let cache = cache.clone();
            Sweeper::new("meta", Duration::from_secs(10), move || {
                let cache = cache.clone();
                async move { cache.cleanup_expired() }
            })
        };
        let handle = tokio::spawn(sweeper.run(shutdown.subscribe()));

        tokio::time::sleep(Duration::from_secs(11)).await;
        // Swept without anyone reading the key.
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("pinned"));

        shutdown.trigger();
        handle.await.unwrap();
    }
}
