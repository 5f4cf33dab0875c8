pub mod in_memory;
pub mod redis_lock;

pub use in_memory::InMemoryLockManager;
pub use redis_lock::RedisLockManager;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Proof of ownership for an acquired lock. The token is unique per
/// acquisition, so a lease that expired and was re-acquired by someone else
/// can no longer release or extend that newer holder's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    key: String,
    token: String,
}

impl LockLease {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: Uuid::new_v4().to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Cross-process mutual exclusion keyed by string.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Waits up to `wait` for the lock. The lock expires on its own after
    /// `hold` even if never released. `Ok(None)` means the wait timed out.
    async fn try_lock(&self, key: &str, wait: Duration, hold: Duration)
        -> Result<Option<LockLease>>;

    /// Returns true if `lease` is still the current holder of its key.
    async fn is_held(&self, lease: &LockLease) -> Result<bool>;

    /// Releases the lock if `lease` still holds it. Returns false when the
    /// lease had already expired or been released.
    async fn unlock(&self, lease: &LockLease) -> Result<bool>;
}

/// Orders two keys for acquisition. The result depends only on the pair,
/// never on which one is the source, so concurrent two-key operations over
/// the same pair always contend on the same first lock.
pub fn lock_order<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
