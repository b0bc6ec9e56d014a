#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tagger Core Rust
//!
//! High-performance Rust core for tag-index caching and invalidation,
//! designed to complement the Grimoire content engine.
//!
//! ## Overview
//!
//! Tags form a many-to-many index between users, tag names, and entities
//! (books, items, dungeons). The index is expensive to query relationally,
//! so reads go through a cache that must stay consistent across concurrent
//! readers/writers and across processes. This crate is that consistency
//! engine: a distributed lock with renewal, a stampede-safe cache-aside read
//! path, and an asynchronous, retryable invalidation pipeline driven by a
//! message queue.
//!
//! ## Architecture
//!
//! Coordination happens entirely through the external store (locks) and
//! queue (messages); the only in-process shared state is the worker's own
//! lifecycle, behind its mutex. A read that misses the cache takes the
//! distributed lock for the key, re-checks, and rebuilds from the repository
//! at most once per key per process. A write-side invalidation enqueues one
//! message per dependent cache dimension before clearing its own key; the
//! background worker consumes those messages and re-invokes the same
//! invalidation methods with propagation disabled, capping fan-out at one
//! hop.
//!
//! ## Module Organization
//!
//! - [`models`] - Tag associations, entity types, and the repository contract
//! - [`store`] - Cache store contract with Redis and in-memory backends
//! - [`lock`] - Distributed lock with watchdog renewal
//! - [`cache`] - Cache key schemas and the stampede-safe set cache
//! - [`messaging`] - Invalidation messages, queue contracts, retry policy
//! - [`worker`] - Background invalidation consumer
//! - [`services`] - The tag service composing all of the above
//! - [`config`] - Environment-derived configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagger_core::cache::SetCache;
//! use tagger_core::config::TaggerConfig;
//! use tagger_core::lock::DistributedLock;
//! use tagger_core::messaging::{AlwaysRequeue, MemoryQueue};
//! use tagger_core::models::EntityType;
//! use tagger_core::services::TagService;
//! use tagger_core::store::RedisStore;
//! use tagger_core::worker::{InvalidationWorker, WorkerConfig};
//! # use tagger_core::models::TagRepository;
//!
//! # async fn example(repository: Arc<dyn TagRepository>) -> tagger_core::Result<()> {
//! let config = TaggerConfig::from_env()?;
//! let store = Arc::new(RedisStore::connect(&config.redis_url).await?);
//! let lock = Arc::new(DistributedLock::new(
//!     store.clone(),
//!     config.max_lock_retries,
//!     config.lock_retry_interval(),
//!     config.read_lock_ttl(),
//! ));
//! let cache = Arc::new(SetCache::new(store, lock.clone(), config.read_lock_ttl()));
//! let queue = Arc::new(MemoryQueue::new());
//!
//! let service = Arc::new(TagService::new(
//!     cache,
//!     lock,
//!     queue.clone(),
//!     repository,
//!     EntityType::ALL.to_vec(),
//!     &config,
//! ));
//!
//! let worker = InvalidationWorker::new(
//!     queue.clone(),
//!     queue,
//!     Arc::new(AlwaysRequeue),
//!     WorkerConfig::from_config(&config),
//! );
//! worker.start(service.invalidation_handler());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod lock;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod services;
pub mod store;
pub mod worker;

pub use cache::{CacheKey, CacheReadResult, SetCache};
pub use config::TaggerConfig;
pub use error::{Result, TaggerError};
pub use lock::{DistributedLock, LockToken};
pub use messaging::{
    AlwaysRequeue, BoundedAttempts, Delivery, InvalidationAction, InvalidationMessage,
    MemoryQueue, QueueConsumer, QueueProducer, RetryPolicy,
};
pub use models::{EntityType, Tag, TagRepository};
pub use services::TagService;
pub use store::{CacheStore, MemoryStore, RedisStore};
pub use worker::{InvalidationHandler, InvalidationWorker, WorkerConfig, WorkerState};
