//! Stampede-safe set cache.
//!
//! A thin cache-aside wrapper over the store's native set type. Reads are
//! lock-free; writes take the distributed lock for the key so no two
//! processes repopulate the same entry concurrently. The double-check in the
//! tag service's read path is what prevents thundering-herd rebuilds.

use crate::cache::CacheKey;
use crate::constants::KNOWN_EMPTY_MEMBER;
use crate::error::Result;
use crate::lock::DistributedLock;
use crate::store::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a cache read.
///
/// `KnownEmpty` records that the repository positively returned no rows,
/// which callers must distinguish from `Absent` (nothing cached, fall through
/// to the repository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheReadResult<T> {
    Found(Vec<T>),
    KnownEmpty,
    Absent,
}

impl<T> CacheReadResult<T> {
    /// Whether the read can be served from cache without a rebuild.
    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheReadResult::Absent)
    }

    /// Cached members, treating a known-empty entry as an empty list.
    /// `None` only for `Absent`.
    pub fn into_members(self) -> Option<Vec<T>> {
        match self {
            CacheReadResult::Found(members) => Some(members),
            CacheReadResult::KnownEmpty => Some(Vec::new()),
            CacheReadResult::Absent => None,
        }
    }
}

/// Set-valued cache with write-side locking.
pub struct SetCache {
    store: Arc<dyn CacheStore>,
    lock: Arc<DistributedLock>,
    write_lock_ttl: Duration,
}

impl SetCache {
    pub fn new(store: Arc<dyn CacheStore>, lock: Arc<DistributedLock>, write_lock_ttl: Duration) -> Self {
        Self {
            store,
            lock,
            write_lock_ttl,
        }
    }

    /// Read all members of the cached set. Fast path, no locking.
    pub async fn get_all(&self, key: &CacheKey) -> Result<CacheReadResult<String>> {
        let members = self.store.smembers(key.as_str()).await?;
        if members.is_empty() {
            return Ok(CacheReadResult::Absent);
        }
        if members.iter().all(|m| m == KNOWN_EMPTY_MEMBER) {
            return Ok(CacheReadResult::KnownEmpty);
        }
        Ok(CacheReadResult::Found(
            members
                .into_iter()
                .filter(|m| m != KNOWN_EMPTY_MEMBER)
                .collect(),
        ))
    }

    /// Typed read for identifier sets. Unparsable members are skipped with a
    /// warning rather than failing the read.
    pub async fn get_all_ids(&self, key: &CacheKey) -> Result<CacheReadResult<u64>> {
        match self.get_all(key).await? {
            CacheReadResult::Found(members) => {
                let ids = members
                    .into_iter()
                    .filter_map(|m| match m.parse::<u64>() {
                        Ok(id) => Some(id),
                        Err(_) => {
                            warn!(key = %key, member = %m, "skipping unparsable cache member");
                            None
                        }
                    })
                    .collect();
                Ok(CacheReadResult::Found(ids))
            }
            CacheReadResult::KnownEmpty => Ok(CacheReadResult::KnownEmpty),
            CacheReadResult::Absent => Ok(CacheReadResult::Absent),
        }
    }

    /// Add members under the distributed lock for the key, then apply the
    /// TTL (skipped when `ttl` is `None`).
    pub async fn insert(&self, key: &CacheKey, ttl: Option<Duration>, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let token = self.lock.acquire(key.as_str(), self.write_lock_ttl).await?;
        let result = self.populate(key, ttl, members).await;
        if let Err(e) = self.lock.release(key.as_str(), token).await {
            warn!(key = %key, error = %e, "lock release failed after insert");
        }
        result
    }

    /// Typed insert for identifier sets.
    pub async fn insert_ids(&self, key: &CacheKey, ttl: Option<Duration>, ids: &[u64]) -> Result<()> {
        let members: Vec<String> = ids.iter().map(u64::to_string).collect();
        self.insert(key, ttl, &members).await
    }

    /// Record a positively-known-empty result under the lock for the key.
    pub async fn insert_known_empty(&self, key: &CacheKey, ttl: Option<Duration>) -> Result<()> {
        let token = self.lock.acquire(key.as_str(), self.write_lock_ttl).await?;
        let result = self
            .populate(key, ttl, &[KNOWN_EMPTY_MEMBER.to_string()])
            .await;
        if let Err(e) = self.lock.release(key.as_str(), token).await {
            warn!(key = %key, error = %e, "lock release failed after insert");
        }
        result
    }

    /// Write members without taking the lock. The caller must already hold
    /// the distributed lock for this key (the read path does, around its
    /// double-check).
    pub async fn populate(&self, key: &CacheKey, ttl: Option<Duration>, members: &[String]) -> Result<()> {
        self.store.sadd(key.as_str(), members).await?;
        if let Some(ttl) = ttl {
            self.store.expire(key.as_str(), ttl).await?;
        }
        debug!(key = %key, count = members.len(), "cache entry populated");
        Ok(())
    }

    /// Typed [`Self::populate`] for identifier sets.
    pub async fn populate_ids(&self, key: &CacheKey, ttl: Option<Duration>, ids: &[u64]) -> Result<()> {
        let members: Vec<String> = ids.iter().map(u64::to_string).collect();
        self.populate(key, ttl, &members).await
    }

    /// [`Self::populate`] variant recording a known-empty result.
    pub async fn populate_known_empty(&self, key: &CacheKey, ttl: Option<Duration>) -> Result<()> {
        self.populate(key, ttl, &[KNOWN_EMPTY_MEMBER.to_string()])
            .await
    }

    /// Delete the key, retrying up to `max_retries` times on store error
    /// before surfacing the failure.
    pub async fn clear(&self, key: &CacheKey, max_retries: u32) -> Result<()> {
        let attempts = max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.del(key.as_str()).await {
                Ok(_) => {
                    debug!(key = %key, attempt = attempt, "cache entry cleared");
                    return Ok(());
                }
                Err(e) => {
                    warn!(key = %key, attempt = attempt, error = %e, "cache clear failed");
                    if attempt >= attempts {
                        return Err(e);
                    }
                }
            }
        }
    }
}
