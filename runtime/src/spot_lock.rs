//! Per-space locks on top of the [`DistributedMutex`].

use crate::metrics::SpotLockMetrics;
use smart_parking_core::error::LockError;
use smart_parking_core::lock::{DistributedMutex, LockHandle, spot_lock_key};
use smart_parking_core::types::SpaceId;
use std::sync::Arc;
use std::time::Duration;

/// Takes and releases `spot-lock:{space}` with a fixed TTL.
///
/// Acquisition fails fast. Release never fails: a lock that already expired
/// or was taken over is logged and otherwise ignored.
#[derive(Clone)]
pub struct SpotLocks {
    mutex: Arc<dyn DistributedMutex>,
    ttl: Duration,
    timeout: Duration,
}

impl SpotLocks {
    /// Locks granted for `ttl`, each lock call bounded by `timeout`.
    #[must_use]
    pub fn new(mutex: Arc<dyn DistributedMutex>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            mutex,
            ttl,
            timeout,
        }
    }

    /// TTL every lock is granted with
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lock for `space_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::LockUnavailable`] if another holder has it, or
    /// [`LockError::Backend`] if the lock service fails or times out.
    pub async fn acquire(&self, space_id: SpaceId) -> Result<LockHandle, LockError> {
        let key = spot_lock_key(space_id);
        let result = tokio::time::timeout(self.timeout, self.mutex.acquire(key.clone(), self.ttl))
            .await
            .unwrap_or_else(|_| {
                Err(LockError::Backend(format!(
                    "acquire {key} timed out after {:?}",
                    self.timeout
                )))
            });

        match &result {
            Ok(_) => {
                SpotLockMetrics::record_acquire("acquired");
                tracing::debug!(space = %space_id, "Spot lock acquired");
            },
            Err(LockError::LockUnavailable { .. }) => {
                SpotLockMetrics::record_acquire("unavailable");
                tracing::debug!(space = %space_id, "Spot lock held elsewhere");
            },
            Err(e) => {
                SpotLockMetrics::record_acquire("error");
                tracing::warn!(space = %space_id, error = %e, "Spot lock acquisition failed");
            },
        }
        result
    }

    /// Release a lock taken with [`acquire`](Self::acquire).
    pub async fn release(&self, handle: &LockHandle) {
        let result = tokio::time::timeout(self.timeout, self.mutex.release(handle)).await;
        match result {
            Ok(Ok(())) => {
                SpotLockMetrics::record_release("released");
                tracing::debug!(key = handle.key(), "Spot lock released");
            },
            Ok(Err(LockError::LockNotHeld { key })) => {
                SpotLockMetrics::record_release("not_held");
                tracing::warn!(key = %key, "Spot lock expired before release");
            },
            Ok(Err(e)) => {
                SpotLockMetrics::record_release("error");
                tracing::warn!(key = handle.key(), error = %e, "Spot lock release failed");
            },
            Err(_) => {
                SpotLockMetrics::record_release("error");
                tracing::warn!(key = handle.key(), "Spot lock release timed out");
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use smart_parking_testing::InMemoryMutex;

    fn locks(mutex: &Arc<InMemoryMutex>) -> SpotLocks {
        SpotLocks::new(mutex.clone(), Duration::from_secs(10), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn acquire_uses_spot_lock_key() {
        let mutex = Arc::new(InMemoryMutex::new());
        let space = SpaceId::new();
        let handle = locks(&mutex).acquire(space).await.unwrap();
        assert_eq!(handle.key(), format!("spot-lock:{space}"));
        assert!(mutex.is_held(&spot_lock_key(space)));
    }

    #[tokio::test]
    async fn double_release_is_harmless() {
        let mutex = Arc::new(InMemoryMutex::new());
        let locks = locks(&mutex);
        let handle = locks.acquire(SpaceId::new()).await.unwrap();
        locks.release(&handle).await;
        locks.release(&handle).await;
        assert_eq!(mutex.released(), 1);
    }

    #[tokio::test]
    async fn backend_failure_is_an_error_not_unavailability() {
        let mutex = Arc::new(InMemoryMutex::new());
        mutex.set_backend_down(true);
        assert!(matches!(
            locks(&mutex).acquire(SpaceId::new()).await,
            Err(LockError::Backend(_))
        ));
    }
}
