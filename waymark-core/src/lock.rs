//! The distributed lock provider collaborator.
//!
//! The manager depends only on the [`LockProvider`] trait; a real
//! cross-process implementation (a coordination service, a database
//! advisory lock, etc.) is an integration concern. [`LocalLockProvider`] is
//! the in-process reference implementation used for single-process
//! deployments and for testing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as SyncMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::error::Result;

/// A scoped "acquire, run, release" lock primitive keyed by string.
///
/// `work` runs only if the lock was acquired within `acquire_timeout`.
/// `lease_timeout` bounds how long the caller intends to hold the lock —
/// exceeding it is an operator problem; implementations are not required to
/// preempt `work`.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Acquire `key`, run `work`, then release — regardless of whether
    /// `work` succeeds. Returns `Ok(None)` if the lock could not be
    /// acquired within `acquire_timeout`; otherwise returns `work`'s result.
    async fn try_using<T, F, Fut>(
        &self,
        key: &str,
        acquire_timeout: Duration,
        lease_timeout: Duration,
        work: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send;
}

/// An in-process [`LockProvider`] backed by a keyed map of `tokio::sync::Mutex`.
///
/// Polls `try_lock` on a fixed interval until either the lock is acquired or
/// `acquire_timeout` elapses, mirroring a `pg_try_advisory_lock` polling
/// loop against a single shared process instead of a database.
pub struct LocalLockProvider {
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    poll_interval: Duration,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
            poll_interval: Duration::from_millis(20),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl Default for LocalLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn try_using<T, F, Fut>(
        &self,
        key: &str,
        acquire_timeout: Duration,
        lease_timeout: Duration,
        work: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mutex = self.lock_for(key);
        let deadline = Instant::now() + acquire_timeout;

        log::debug!(
            "Trying to acquire lock '{}' (acquire_timeout={:?}, lease_timeout={:?})",
            key,
            acquire_timeout,
            lease_timeout
        );

        loop {
            match mutex.try_lock() {
                Ok(guard) => {
                    log::info!("Acquired lock '{}'", key);
                    let result = work().await;
                    drop(guard);
                    log::info!("Released lock '{}'", key);
                    return result.map(Some);
                }
                Err(_) => {
                    if Instant::now() >= deadline {
                        log::warn!(
                            "Timed out waiting for lock '{}' after {:?}",
                            key,
                            acquire_timeout
                        );
                        return Ok(None);
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}
