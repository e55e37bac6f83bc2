//! Redis-backed distributed mutex.
//!
//! # Protocol
//!
//! - **Acquire**: `SET {key} {token} NX PX {ttl_ms}`. A nil reply means the
//!   key is held; the caller is told immediately, never queued.
//! - **Release**: a Lua script deletes the key only if it still stores the
//!   caller's token, so a holder whose lock expired cannot free a lock that
//!   someone else has since taken.
//! - **Expiry**: Redis drops the key after the TTL. A crashed holder
//!   therefore blocks the space for at most one TTL.
//!
//! # Example
//!
//! ```no_run
//! use smart_parking_redis::RedisMutex;
//! use smart_parking_core::lock::DistributedMutex;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mutex = RedisMutex::new("redis://127.0.0.1:6379").await?;
//! let handle = mutex.acquire("spot-lock:42".into(), Duration::from_secs(10)).await?;
//! mutex.release(&handle).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{Client, Script};
use smart_parking_core::error::LockError;
use smart_parking_core::lock::{DistributedMutex, LockFuture, LockHandle};
use std::time::Duration;
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
";

/// [`DistributedMutex`] over a single Redis instance.
///
/// `Clone` is cheap; clones share the `ConnectionManager`.
#[derive(Clone)]
pub struct RedisMutex {
    conn_manager: ConnectionManager,
    release: Script,
}

impl RedisMutex {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if the URL is malformed or the server
    /// is unreachable.
    pub async fn new(redis_url: &str) -> Result<Self, LockError> {
        let client = Client::open(redis_url)
            .map_err(|e| LockError::Backend(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            LockError::Backend(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisMutex initialized successfully");

        Ok(Self {
            conn_manager,
            release: Script::new(RELEASE_SCRIPT),
        })
    }

    /// Send `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if Redis does not answer.
    pub async fn ping(&self) -> Result<(), LockError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(format!("Redis ping failed: {e}")))?;
        Ok(())
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl DistributedMutex for RedisMutex {
    fn acquire(&self, key: String, ttl: Duration) -> LockFuture<'_, LockHandle> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let token = Uuid::new_v4().to_string();

            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(|e| LockError::Backend(format!("Failed to acquire {key}: {e}")))?;

            match reply {
                Some(_) => Ok(LockHandle::new(key, token, ttl)),
                None => Err(LockError::LockUnavailable { key }),
            }
        })
    }

    fn release(&self, handle: &LockHandle) -> LockFuture<'_, ()> {
        let handle = handle.clone();
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();

            let deleted: i64 = self
                .release
                .key(handle.key())
                .arg(handle.token())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| {
                    LockError::Backend(format!("Failed to release {}: {e}", handle.key()))
                })?;

            if deleted == 0 {
                return Err(LockError::LockNotHeld {
                    key: handle.key().to_string(),
                });
            }
            Ok(())
        })
    }
}
