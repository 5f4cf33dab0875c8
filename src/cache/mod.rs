pub mod account_cache;
pub mod in_memory;

pub use account_cache::RedisAccountCache;
pub use in_memory::InMemoryAccountCache;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::models::Account;

/// Best-effort snapshot cache keyed by account number. Never authoritative:
/// an entry may be stale or missing at any time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountCache: Send + Sync {
    /// Returns the cached snapshot, or `None` on miss or backend failure.
    async fn get(&self, account_number: &str) -> Option<Account>;

    async fn set(&self, account: &Account, ttl: Duration) -> Result<()>;

    async fn delete(&self, account_number: &str) -> Result<()>;
}

/// Cache statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub invalidations: AtomicU64,
    pub errors: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn get_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn get_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn get_invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn get_errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats() {
        let stats = CacheStats::new();

        assert_eq!(stats.get_hits(), 0);
        assert_eq!(stats.get_misses(), 0);
        assert_eq!(stats.hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_invalidation();

        assert_eq!(stats.get_hits(), 2);
        assert_eq!(stats.get_misses(), 1);
        assert_eq!(stats.get_invalidations(), 1);
        assert!((stats.hit_rate() - 0.666).abs() < 0.01);
    }
}
