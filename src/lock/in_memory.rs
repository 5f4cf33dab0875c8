use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::{LockLease, LockManager};
use crate::error::Result;

#[derive(Debug)]
struct Holder {
    token: String,
    expires_at: Instant,
}

/// Process-local lock manager with the same lease semantics as the Redis
/// implementation: bounded wait, bounded hold, token-checked release.
pub struct InMemoryLockManager {
    holders: Mutex<HashMap<String, Holder>>,
    retry_interval: Duration,
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(2))
    }
}

impl InMemoryLockManager {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            holders: Mutex::new(HashMap::new()),
            retry_interval,
        }
    }

    fn holders(&self) -> MutexGuard<'_, HashMap<String, Holder>> {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_insert(&self, lease: &LockLease, hold: Duration) -> bool {
        let now = Instant::now();
        let mut holders = self.holders();
        match holders.get(lease.key()) {
            Some(holder) if holder.expires_at > now => false,
            _ => {
                holders.insert(
                    lease.key().to_string(),
                    Holder {
                        token: lease.token().to_string(),
                        expires_at: now + hold,
                    },
                );
                true
            }
        }
    }

    /// Number of keys currently held and not expired.
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.holders()
            .values()
            .filter(|holder| holder.expires_at > now)
            .count()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn try_lock(
        &self,
        key: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>> {
        let deadline = Instant::now() + wait;
        let lease = LockLease::new(key);

        loop {
            if self.try_insert(&lease, hold) {
                return Ok(Some(lease));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    async fn is_held(&self, lease: &LockLease) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .holders()
            .get(lease.key())
            .map(|holder| holder.token == lease.token() && holder.expires_at > now)
            .unwrap_or(false))
    }

    async fn unlock(&self, lease: &LockLease) -> Result<bool> {
        let mut holders = self.holders();
        let owned = holders
            .get(lease.key())
            .map(|holder| holder.token == lease.token())
            .unwrap_or(false);
        if owned {
            holders.remove(lease.key());
        }
        Ok(owned)
    }
}
