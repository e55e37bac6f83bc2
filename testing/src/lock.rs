//! In-memory distributed mutex.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use smart_parking_core::error::LockError;
use smart_parking_core::lock::{DistributedMutex, LockFuture, LockHandle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
struct Grant {
    token: String,
    expires_at: Instant,
}

/// [`DistributedMutex`] over a `HashMap`, with TTL on the tokio clock.
///
/// Expiry uses [`tokio::time::Instant`], so tests running with
/// `start_paused = true` can move past a TTL with `tokio::time::advance`.
#[derive(Debug, Default)]
pub struct InMemoryMutex {
    grants: Mutex<HashMap<String, Grant>>,
    backend_down: AtomicBool,
    attempts: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl InMemoryMutex {
    /// Create a mutex with no locks held
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `key` as some other holder would, bypassing the counters
    pub fn hold(&self, key: &str, ttl: Duration) -> LockHandle {
        let token = Uuid::new_v4().to_string();
        self.grants.lock().unwrap().insert(
            key.to_string(),
            Grant {
                token: token.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        LockHandle::new(key.to_string(), token, ttl)
    }

    /// Whether `key` is held and not expired
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.grants
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|g| g.expires_at > Instant::now())
    }

    /// Number of keys currently held
    #[must_use]
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.grants
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.expires_at > now)
            .count()
    }

    /// Make every call fail with [`LockError::Backend`]
    pub fn set_backend_down(&self, down: bool) {
        self.backend_down.store(down, Ordering::SeqCst);
    }

    /// Calls to `acquire`, successful or not
    #[must_use]
    pub fn acquire_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successful acquisitions
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Successful releases
    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn check_backend(&self) -> Result<(), LockError> {
        if self.backend_down.load(Ordering::SeqCst) {
            return Err(LockError::Backend("lock backend unavailable".into()));
        }
        Ok(())
    }
}

impl DistributedMutex for InMemoryMutex {
    fn acquire(&self, key: String, ttl: Duration) -> LockFuture<'_, LockHandle> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.check_backend()?;

            let now = Instant::now();
            let mut grants = self.grants.lock().unwrap();
            if grants.get(&key).is_some_and(|g| g.expires_at > now) {
                return Err(LockError::LockUnavailable { key });
            }
            let token = Uuid::new_v4().to_string();
            grants.insert(
                key.clone(),
                Grant {
                    token: token.clone(),
                    expires_at: now + ttl,
                },
            );
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(LockHandle::new(key, token, ttl))
        })
    }

    fn release(&self, handle: &LockHandle) -> LockFuture<'_, ()> {
        let handle = handle.clone();
        Box::pin(async move {
            self.check_backend()?;

            let now = Instant::now();
            let mut grants = self.grants.lock().unwrap();
            let owned = grants
                .get(handle.key())
                .is_some_and(|g| g.token == handle.token() && g.expires_at > now);
            if !owned {
                return Err(LockError::LockNotHeld {
                    key: handle.key().to_string(),
                });
            }
            grants.remove(handle.key());
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
