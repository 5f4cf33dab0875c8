use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{AccountCache, CacheStats};
use crate::config::CacheSettings;
use crate::error::{AppError, Result};
use crate::models::Account;
use crate::observability::get_metrics;

/// Cached account entry with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAccount {
    account: Account,
    cached_at: i64,
}

/// Redis-based cache for account snapshots.
///
/// Connection failures degrade to cache misses and silent no-op writes; only
/// command failures on an established connection are reported to callers.
pub struct RedisAccountCache {
    client: redis::Client,
    settings: CacheSettings,
    stats: Arc<CacheStats>,
}

impl RedisAccountCache {
    pub fn new(client: redis::Client, settings: CacheSettings) -> Self {
        Self {
            client,
            settings,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }

    fn cache_key(&self, account_number: &str) -> String {
        format!("{}:cache:{}", self.settings.key_prefix, account_number)
    }

    async fn connection(&self, operation: &'static str) -> Option<redis::aio::MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                self.stats.record_error();
                get_metrics().record_cache_error(operation);
                tracing::warn!("Redis connection error in cache {}: {}", operation, e);
                None
            }
        }
    }
}

#[async_trait]
impl AccountCache for RedisAccountCache {
    async fn get(&self, account_number: &str) -> Option<Account> {
        if !self.settings.enabled {
            return None;
        }

        let key = self.cache_key(account_number);
        let mut conn = self.connection("get").await?;

        let result: Option<String> = match conn.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                self.stats.record_error();
                get_metrics().record_cache_error("get");
                tracing::warn!("Redis get error: {}", e);
                return None;
            }
        };

        match result {
            Some(json) => match serde_json::from_str::<CachedAccount>(&json) {
                Ok(cached) => {
                    self.stats.record_hit();
                    get_metrics().record_cache_lookup(true);
                    tracing::debug!(account_number = %account_number, "Cache hit for account");
                    Some(cached.account)
                }
                Err(e) => {
                    self.stats.record_error();
                    tracing::warn!("Failed to deserialize cached account: {}", e);
                    if let Err(e) = self.delete(account_number).await {
                        tracing::warn!("Failed to evict undecodable cache entry: {}", e);
                    }
                    None
                }
            },
            None => {
                self.stats.record_miss();
                get_metrics().record_cache_lookup(false);
                None
            }
        }
    }

    async fn set(&self, account: &Account, ttl: Duration) -> Result<()> {
        if !self.settings.enabled {
            return Ok(());
        }

        let key = self.cache_key(&account.account_number);
        let cached = CachedAccount {
            account: account.clone(),
            cached_at: chrono::Utc::now().timestamp(),
        };

        let json = serde_json::to_string(&cached)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize account: {}", e)))?;

        let Some(mut conn) = self.connection("set").await else {
            return Ok(());
        };

        let ttl_secs = ttl.as_secs().max(1);
        match conn.set_ex::<_, _, ()>(&key, json, ttl_secs).await {
            Ok(_) => {
                tracing::debug!(
                    account_number = %account.account_number,
                    ttl_secs = ttl_secs,
                    "Cached account"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.record_error();
                get_metrics().record_cache_error("set");
                tracing::warn!("Redis set error: {}", e);
                Err(AppError::Redis(e))
            }
        }
    }

    async fn delete(&self, account_number: &str) -> Result<()> {
        if !self.settings.enabled {
            return Ok(());
        }

        let key = self.cache_key(account_number);
        let Some(mut conn) = self.connection("delete").await else {
            return Ok(());
        };

        match conn.del::<_, ()>(&key).await {
            Ok(_) => {
                self.stats.record_invalidation();
                tracing::debug!(account_number = %account_number, "Invalidated cached account");
                Ok(())
            }
            Err(e) => {
                self.stats.record_error();
                get_metrics().record_cache_error("delete");
                tracing::warn!("Redis del error: {}", e);
                Err(AppError::Redis(e))
            }
        }
    }
}
