//! # Cache Store Abstraction
//!
//! Key/value + set operations the lock and cache layers are built on. The
//! store itself is external; this module ships the trait contract, a Redis
//! adapter, and an in-memory implementation for tests and single-process
//! deployments.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Operations the cache core needs from the backing key/value store.
///
/// The two compare-and-* operations must be evaluated atomically server-side:
/// lock ownership is proven by token equality, never by key existence alone.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a plain string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomic set-if-absent with a TTL. Returns true when the key was set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Add members to the set at `key`, creating it if missing.
    async fn sadd(&self, key: &str, members: &[String]) -> Result<()>;

    /// All members of the set at `key`; empty when the key is missing.
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Delete `key`, returning the number of keys removed.
    async fn del(&self, key: &str) -> Result<u64>;

    /// Set a TTL on an existing key. Returns false when the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key` only if its current value equals `expected`.
    /// Returns the number of keys deleted (0 or 1).
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<u64>;

    /// Extend the TTL of `key` only if its current value equals `expected`.
    /// Returns true when the TTL was extended.
    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool>;
}
