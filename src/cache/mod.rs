//! Caching subsystem.
//!
//! # Data Flow
//! ```text
//! Caller builds a key (key.rs)
//!     → lru.rs: in-memory lookup (hit → value, miss → None)
//!     → persistent.rs: on-disk lookup for long-lived data
//!     → on miss the caller runs the protected call and stores the result
//!
//! sweeper.rs periodically calls cleanup_expired on both caches.
//! ```
//!
//! # Design Decisions
//! - TTL of zero means "never expires" everywhere
//! - Expired entries read as absent and are removed on access
//! - The persistent cache never fails a caller; errors become misses

pub mod entry;
pub mod key;
pub mod lru;
pub mod persistent;
pub mod sweeper;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use lru::LruCache;
pub use persistent::{EntryInfo, PersistentCache};
pub use sweeper::Sweeper;

use serde::Serialize;

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    /// `None` for caches without a bound.
    pub capacity: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0 with no lookups.
    pub hit_rate: f64,
    /// size / capacity, 0 for unbounded caches.
    pub utilization: f64,
}

impl CacheStats {
    /// Derive hit rate and utilization from raw counts.
    pub fn new(size: usize, capacity: Option<usize>, hits: u64, misses: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };
        let utilization = match capacity {
            Some(capacity) if capacity > 0 => size as f64 / capacity as f64,
            _ => 0.0,
        };
        Self {
            size,
            capacity,
            hits,
            misses,
            hit_rate,
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_math() {
        let stats = CacheStats::new(3, Some(12), 2, 6);
        assert_eq!(stats.hit_rate, 0.25);
        assert_eq!(stats.utilization, 0.25);

        let empty = CacheStats::new(0, None, 0, 0);
        assert_eq!(empty.hit_rate, 0.0);
        assert_eq!(empty.utilization, 0.0);
    }
}
