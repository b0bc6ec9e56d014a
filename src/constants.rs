//! # System Constants
//!
//! Core constants that define the operational boundaries of the tag cache:
//! retry budgets, intervals, TTLs, and reserved key material.

/// Default values for all recognized configuration options.
///
/// Every value here can be overridden through [`crate::config::TaggerConfig`].
pub mod defaults {
    /// Maximum attempts to acquire a distributed lock before giving up
    pub const MAX_LOCK_RETRIES: u32 = 5;

    /// Sleep between lock acquisition attempts
    pub const LOCK_RETRY_INTERVAL_MS: u64 = 100;

    /// Maximum attempts to clear a cache key on store error
    pub const MAX_CACHE_CLEAR_RETRIES: u32 = 3;

    /// Lifetime of populated cache entries (24 hours)
    pub const CACHE_TTL_SECS: u64 = 24 * 60 * 60;

    /// Lifetime of the lock taken around the read-path double-check
    pub const READ_LOCK_TTL_SECS: u64 = 10;

    /// Number of messages the invalidation worker fetches per batch
    pub const WORKER_BATCH_SIZE: usize = 10;

    /// Sleep when the queue comes back empty
    pub const WORKER_POLL_INTERVAL_MS: u64 = 1000;

    /// Consecutive fetch errors tolerated before the backoff stops growing
    pub const WORKER_MAX_FETCH_ERRORS: u32 = 5;

    /// Base backoff after a queue or store error in the worker loop
    pub const WORKER_ERROR_BACKOFF_MS: u64 = 500;
}

/// Namespace prefix for distributed lock keys.
///
/// Lock entries live beside cache entries in the same store; the prefix keeps
/// a lock on a cache key from colliding with the cache key itself.
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Reserved set member marking a positively-known-empty cache entry.
///
/// A key holding only this member means "the repository returned no rows",
/// which readers must distinguish from "nothing cached". The member never
/// leaks out of the cache layer.
pub const KNOWN_EMPTY_MEMBER: &str = "__known_empty__";

/// Queue carrying invalidation messages between processes.
pub const INVALIDATION_QUEUE: &str = "tag_cache_invalidation";
