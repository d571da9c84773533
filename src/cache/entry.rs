//! A timestamped cache value with a time-to-live.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value plus its creation time and TTL.
///
/// A zero TTL means the entry never expires.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    value: T,
    created_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Create an entry stamped with the current time.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// True once the entry is older than its TTL (never for a zero TTL).
    pub fn is_expired(&self) -> bool {
        !self.ttl.is_zero() && self.age() > self.ttl
    }

    /// Time since creation.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Borrow the cached value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume the entry, returning the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary() {
        let entry = CacheEntry::new("deck", Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(10)).await;
        // Exactly at the TTL is still fresh; strictly older is expired.
        assert!(!entry.is_expired());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.age(), Duration::from_millis(10_001));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let entry = CacheEntry::new(42, Duration::ZERO);
        tokio::time::advance(Duration::from_secs(10 * 365 * 24 * 3600)).await;
        assert!(!entry.is_expired());
        assert_eq!(*entry.value(), 42);
    }
}
