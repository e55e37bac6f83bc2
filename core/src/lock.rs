//! Distributed lock abstraction.
//!
//! Locks are named, time-bounded and owned by a random token. Acquisition
//! never waits: a held key fails immediately with
//! [`LockError::LockUnavailable`] and the caller moves on instead of retrying
//! the same key. An unreleased lock expires after its TTL on the server.

use crate::error::LockError;
use crate::types::SpaceId;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by lock operations.
pub type LockFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LockError>> + Send + 'a>>;

/// Key prefix for per-space locks.
pub const SPOT_LOCK_PREFIX: &str = "spot-lock:";

/// Resource key guarding a space's occupancy and assignment.
#[must_use]
pub fn spot_lock_key(space_id: SpaceId) -> String {
    format!("{SPOT_LOCK_PREFIX}{space_id}")
}

/// Proof of a granted lock.
///
/// The token is what makes release safe: only the holder that set it can
/// delete the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockHandle {
    key: String,
    token: String,
    ttl: Duration,
}

impl LockHandle {
    /// Build a handle for a granted lock
    #[must_use]
    pub const fn new(key: String, token: String, ttl: Duration) -> Self {
        Self { key, token, ttl }
    }

    /// Resource key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release token
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// TTL the lock was granted with
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Named mutual exclusion shared by every processing instance.
pub trait DistributedMutex: Send + Sync {
    /// Try to take `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::LockUnavailable`] immediately if the key is
    /// held, or [`LockError::Backend`] if the lock service fails.
    fn acquire(&self, key: String, ttl: Duration) -> LockFuture<'_, LockHandle>;

    /// Release a lock taken with [`acquire`](Self::acquire).
    ///
    /// Safe to call from cleanup paths: releasing an expired or already
    /// released handle never deletes another holder's lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::LockNotHeld`] if the handle no longer owns the
    /// key, or [`LockError::Backend`] if the lock service fails.
    fn release(&self, handle: &LockHandle) -> LockFuture<'_, ()>;
}
