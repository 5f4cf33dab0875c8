use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::Instant;

use super::{LockLease, LockManager};
use crate::error::{AppError, Result};

/// Deletes the key only if it still carries the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed lock manager: `SET key token NX PX hold` to acquire, a
/// token-checked delete to release. Waiters poll at `retry_interval`.
pub struct RedisLockManager {
    client: redis::Client,
    retry_interval: Duration,
    release_script: redis::Script,
}

impl RedisLockManager {
    pub fn new(client: redis::Client, retry_interval: Duration) -> Self {
        Self {
            client,
            retry_interval,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        }
    }

    async fn connection(&self) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn set_if_absent(&self, lease: &LockLease, hold: Duration) -> redis::RedisResult<bool> {
        let mut conn = self.connection().await?;
        let result: Option<String> = conn
            .set_options(
                lease.key(),
                lease.token(),
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .with_expiration(redis::SetExpiry::PX(hold.as_millis().max(1) as usize)),
            )
            .await?;
        Ok(result.is_some())
    }

    async fn release(&self, lease: &LockLease) -> redis::RedisResult<bool> {
        let mut conn = self.connection().await?;
        let deleted: i64 = self
            .release_script
            .key(lease.key())
            .arg(lease.token())
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_lock(
        &self,
        key: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockLease>> {
        let deadline = Instant::now() + wait;
        let lease = LockLease::new(key);

        loop {
            match self.set_if_absent(&lease, hold).await {
                Ok(true) => return Ok(Some(lease)),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Redis error while acquiring lock");
                    // The SET may have landed even though the reply was lost.
                    if let Err(release_err) = self.release(&lease).await {
                        tracing::warn!(key = %key, error = %release_err, "Failed to clear partial lock");
                    }
                    return Err(AppError::LockInterrupted(key.to_string()));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    async fn is_held(&self, lease: &LockLease) -> Result<bool> {
        let mut conn = self.connection().await.map_err(AppError::Redis)?;
        let holder: Option<String> = conn.get(lease.key()).await.map_err(AppError::Redis)?;
        Ok(holder.as_deref() == Some(lease.token()))
    }

    async fn unlock(&self, lease: &LockLease) -> Result<bool> {
        self.release(lease).await.map_err(AppError::Redis)
    }
}
