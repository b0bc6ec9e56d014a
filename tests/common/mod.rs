//! Shared fixtures: an in-memory repository with fetch counting and a
//! helper that wires the full cache stack over the in-memory store and
//! queue.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tagger_core::cache::SetCache;
use tagger_core::config::TaggerConfig;
use tagger_core::error::Result;
use tagger_core::lock::DistributedLock;
use tagger_core::messaging::MemoryQueue;
use tagger_core::models::{EntityType, Tag, TagRepository};
use tagger_core::services::TagService;
use tagger_core::store::MemoryStore;

/// In-memory repository fake counting how often it is consulted.
#[derive(Default)]
pub struct MockTagRepository {
    tags: Mutex<HashMap<String, Tag>>,
    tags_by_user: Mutex<HashMap<u64, Vec<String>>>,
    users_by_tag: Mutex<HashMap<String, Vec<u64>>>,
    tags_by_entity: Mutex<HashMap<u64, Vec<String>>>,
    entities_by_tag: Mutex<HashMap<(u64, String, EntityType), Vec<u64>>>,
    fetch_count: AtomicU32,
}

impl MockTagRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tag(&self, tag: Tag) {
        self.tags.lock().insert(tag.tag.clone(), tag);
    }

    pub fn set_user_tags(&self, user_id: u64, tags: &[&str]) {
        self.tags_by_user
            .lock()
            .insert(user_id, tags.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_users_for_tag(&self, tag: &str, users: &[u64]) {
        self.users_by_tag
            .lock()
            .insert(tag.to_string(), users.to_vec());
    }

    pub fn set_entity_tags(&self, entity_id: u64, tags: &[&str]) {
        self.tags_by_entity
            .lock()
            .insert(entity_id, tags.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_entities(&self, user_id: u64, tag: &str, entity_type: EntityType, ids: &[u64]) {
        self.entities_by_tag
            .lock()
            .insert((user_id, tag.to_string(), entity_type), ids.to_vec());
    }

    /// How many repository reads have happened, across all methods.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagRepository for MockTagRepository {
    async fn get_tag(&self, tag: &str) -> Result<Option<Tag>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.tags.lock().get(tag).cloned())
    }

    async fn get_users_by_tag(&self, tag: &str) -> Result<Vec<u64>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.users_by_tag.lock().get(tag).cloned().unwrap_or_default())
    }

    async fn get_tags_by_user(&self, user_id: u64) -> Result<Vec<String>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tags_by_user
            .lock()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_tags_by_entity(&self, entity_id: u64) -> Result<Vec<String>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tags_by_entity
            .lock()
            .get(&entity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_entities_by_tag(
        &self,
        user_id: u64,
        tag: &str,
        entity_type: EntityType,
    ) -> Result<Vec<u64>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entities_by_tag
            .lock()
            .get(&(user_id, tag.to_string(), entity_type))
            .cloned()
            .unwrap_or_default())
    }
}

/// Test configuration: generous lock retry budget so concurrent readers wait
/// out a rebuild instead of flaking, everything else at defaults.
pub fn test_config() -> TaggerConfig {
    TaggerConfig {
        max_lock_retries: 50,
        lock_retry_interval_ms: 10,
        cache_ttl_secs: 3600,
        read_lock_ttl_secs: 10,
        ..TaggerConfig::default()
    }
}

/// Full stack over the in-memory store and queue, with Book and Item as the
/// supported entity types.
pub fn build_stack(
    repository: Arc<MockTagRepository>,
) -> (Arc<MemoryStore>, Arc<MemoryQueue>, Arc<TagService>) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let lock = Arc::new(DistributedLock::new(
        store.clone(),
        config.max_lock_retries,
        config.lock_retry_interval(),
        config.read_lock_ttl(),
    ));
    let cache = Arc::new(SetCache::new(
        store.clone(),
        lock.clone(),
        config.read_lock_ttl(),
    ));
    let queue = Arc::new(MemoryQueue::new());
    let service = Arc::new(TagService::new(
        cache,
        lock,
        queue.clone(),
        repository,
        vec![EntityType::Book, EntityType::Item],
        &config,
    ));
    (store, queue, service)
}
