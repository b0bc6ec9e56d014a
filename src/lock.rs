//! # Distributed Lock
//!
//! Token-owned mutual exclusion over the cache store. A lock is a namespaced
//! key holding a random token; only the holder of the matching token can
//! release or renew it, with the comparison evaluated atomically server-side.
//! Long-running holders keep the lock alive through a watchdog task that
//! renews the TTL until the work completes or ownership is lost.

use crate::constants::LOCK_KEY_PREFIX;
use crate::error::{Result, TaggerError};
use crate::store::CacheStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

/// Proof of lock ownership for a single acquisition.
///
/// Tokens are random per acquisition and consumed on release; a token must
/// never be reused across two acquisitions of the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distributed lock service over a [`CacheStore`].
pub struct DistributedLock {
    store: Arc<dyn CacheStore>,
    max_retries: u32,
    retry_interval: Duration,
    lock_ttl: Duration,
}

impl DistributedLock {
    pub fn new(
        store: Arc<dyn CacheStore>,
        max_retries: u32,
        retry_interval: Duration,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            store,
            max_retries,
            retry_interval,
            lock_ttl,
        }
    }

    fn namespaced(key: &str) -> String {
        format!("{LOCK_KEY_PREFIX}{key}")
    }

    /// Attempt to take the lock on `key`, retrying up to the configured
    /// budget with a fixed sleep between attempts.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken> {
        let token = LockToken::generate();
        let lock_key = Self::namespaced(key);

        for attempt in 1..=self.max_retries {
            if self.store.set_nx(&lock_key, token.as_str(), ttl).await? {
                debug!(key = %key, attempt = attempt, "lock acquired");
                return Ok(token);
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        Err(TaggerError::LockAcquireFailed {
            key: key.to_string(),
            attempts: self.max_retries,
        })
    }

    /// Release the lock on `key`, consuming the token.
    ///
    /// The delete only happens when the stored value still equals the token,
    /// so a holder whose TTL lapsed cannot release a lock someone else has
    /// since acquired.
    pub async fn release(&self, key: &str, token: LockToken) -> Result<()> {
        let lock_key = Self::namespaced(key);
        let deleted = self
            .store
            .compare_and_delete(&lock_key, token.as_str())
            .await?;

        if deleted == 0 {
            return Err(TaggerError::LockReleaseFailed {
                key: key.to_string(),
            });
        }
        debug!(key = %key, "lock released");
        Ok(())
    }

    /// Run `task` while holding the lock on `key`.
    ///
    /// A watchdog task renews the TTL every `renew_interval` until the task
    /// finishes or the renewal fails (ownership lost or store error). The
    /// lock is released when the task completes, regardless of its outcome;
    /// a failed release is logged and swallowed since the TTL reclaims the
    /// key on its own.
    pub async fn with_lock<F, T>(&self, key: &str, renew_interval: Duration, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let token = self.acquire(key, self.lock_ttl).await?;
        let done = Arc::new(Notify::new());
        let watchdog = self.spawn_watchdog(key, token.as_str(), renew_interval, done.clone());

        let result = task.await;

        // Stop renewing before releasing; notify_one leaves a permit in case
        // the watchdog is mid-renewal rather than parked on notified().
        done.notify_one();
        let _ = watchdog.await;

        if let Err(e) = self.release(key, token).await {
            warn!(key = %key, error = %e, "lock release failed; TTL will reclaim it");
        }

        result
    }

    fn spawn_watchdog(
        &self,
        key: &str,
        token: &str,
        renew_interval: Duration,
        done: Arc<Notify>,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let lock_key = Self::namespaced(key);
        let token = token.to_string();
        let ttl = self.lock_ttl;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(renew_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = done.notified() => {
                        debug!(key = %lock_key, "watchdog stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match store.compare_and_expire(&lock_key, &token, ttl).await {
                            Ok(true) => {
                                debug!(key = %lock_key, "lock renewed");
                            }
                            Ok(false) => {
                                warn!(key = %lock_key, "lock ownership lost; watchdog exiting");
                                break;
                            }
                            Err(e) => {
                                warn!(key = %lock_key, error = %e, "lock renewal failed; watchdog exiting");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}
