use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::{AccountCache, CacheStats};
use crate::error::Result;
use crate::models::Account;

struct Entry {
    account: Account,
    expires_at: Instant,
}

/// Process-local expiring cache used for tests and single-node runs.
#[derive(Clone, Default)]
pub struct InMemoryAccountCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    stats: Arc<CacheStats>,
}

impl InMemoryAccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }

    /// Returns the stored entry regardless of expiry, without touching stats.
    pub fn peek(&self, account_number: &str) -> Option<Account> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(account_number).map(|e| e.account.clone())
    }

    /// Writes an entry directly, bypassing the service.
    pub fn put(&self, account: Account, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            account.account_number.clone(),
            Entry {
                account,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl AccountCache for InMemoryAccountCache {
    async fn get(&self, account_number: &str) -> Option<Account> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        match entries.get(account_number) {
            Some(entry) if entry.expires_at > now => {
                self.stats.record_hit();
                Some(entry.account.clone())
            }
            Some(_) => {
                entries.remove(account_number);
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    async fn set(&self, account: &Account, ttl: Duration) -> Result<()> {
        self.put(account.clone(), ttl);
        Ok(())
    }

    async fn delete(&self, account_number: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(account_number).is_some() {
            self.stats.record_invalidation();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(number: &str) -> Account {
        Account::new(1, number.to_string(), "Holder".to_string(), "555".to_string())
    }

    #[tokio::test]
    async fn test_set_then_get_hits() {
        let cache = InMemoryAccountCache::new();
        cache.set(&account("A"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("A").await.map(|a| a.account_number), Some("A".to_string()));
        assert!(cache.get("B").await.is_none());
        assert_eq!(cache.stats().get_hits(), 1);
        assert_eq!(cache.stats().get_misses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = InMemoryAccountCache::new();
        cache.set(&account("A"), Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(cache.get("A").await.is_none());
        assert!(cache.peek("A").is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = InMemoryAccountCache::new();
        cache.set(&account("A"), Duration::from_secs(60)).await.unwrap();

        cache.delete("A").await.unwrap();
        cache.delete("A").await.unwrap();

        assert!(cache.get("A").await.is_none());
        assert_eq!(cache.stats().get_invalidations(), 1);
    }
}
