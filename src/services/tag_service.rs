//! Tag service: stampede-safe reads and fan-out invalidation.
//!
//! Every read follows the same shape: lock-free cache read, then on miss a
//! locked double-check before the repository is consulted at most once per
//! key per process. Every invalidation resolves the dimension's cached
//! membership, enqueues one message per dependent dimension when propagation
//! is requested, and clears its own key last so a racing reader sees either
//! the fully-old or the fully-new state.

use crate::cache::{keys, CacheKey, CacheReadResult, SetCache};
use crate::config::TaggerConfig;
use crate::error::{Result, TaggerError};
use crate::lock::DistributedLock;
use crate::messaging::{InvalidationAction, InvalidationMessage, QueueProducer};
use crate::models::{EntityType, TagRepository};
use crate::worker::InvalidationHandler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Cache-aside facade over the tag index.
pub struct TagService {
    cache: Arc<SetCache>,
    lock: Arc<DistributedLock>,
    producer: Arc<dyn QueueProducer>,
    repository: Arc<dyn TagRepository>,
    supported_types: Vec<EntityType>,
    cache_ttl: Duration,
    renew_interval: Duration,
    clear_retries: u32,
}

impl TagService {
    pub fn new(
        cache: Arc<SetCache>,
        lock: Arc<DistributedLock>,
        producer: Arc<dyn QueueProducer>,
        repository: Arc<dyn TagRepository>,
        supported_types: Vec<EntityType>,
        config: &TaggerConfig,
    ) -> Self {
        Self {
            cache,
            lock,
            producer,
            repository,
            supported_types,
            cache_ttl: config.cache_ttl(),
            renew_interval: config.lock_renew_interval(),
            clear_retries: config.max_cache_clear_retries,
        }
    }

    /// Entity types fan-out loops iterate over.
    pub fn supported_types(&self) -> &[EntityType] {
        &self.supported_types
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Tag names a user has applied.
    #[instrument(skip(self))]
    pub async fn get_tags_by_user(&self, user_id: u64) -> Result<Vec<String>> {
        let key = keys::user_tags(user_id);
        if let Some(tags) = self.cache.get_all(&key).await?.into_members() {
            debug!(key = %key, "cache hit");
            return Ok(tags);
        }

        self.lock
            .with_lock(key.as_str(), self.renew_interval, async {
                // Another caller may have rebuilt the entry while we waited
                if let Some(tags) = self.cache.get_all(&key).await?.into_members() {
                    debug!(key = %key, "cache hit after lock wait");
                    return Ok(tags);
                }
                let tags = self.repository.get_tags_by_user(user_id).await?;
                self.populate_members(&key, &tags).await?;
                Ok(tags)
            })
            .await
    }

    /// User ids holding a tag.
    #[instrument(skip(self))]
    pub async fn get_users_by_tag(&self, tag: &str) -> Result<Vec<u64>> {
        let key = keys::tag_users(tag);
        if let Some(users) = self.cache.get_all_ids(&key).await?.into_members() {
            debug!(key = %key, "cache hit");
            return Ok(users);
        }

        self.lock
            .with_lock(key.as_str(), self.renew_interval, async {
                if let Some(users) = self.cache.get_all_ids(&key).await?.into_members() {
                    debug!(key = %key, "cache hit after lock wait");
                    return Ok(users);
                }
                let users = self.repository.get_users_by_tag(tag).await?;
                self.populate_ids(&key, &users).await?;
                Ok(users)
            })
            .await
    }

    /// Tag names applied to an entity.
    #[instrument(skip(self))]
    pub async fn get_tags_by_entity(&self, entity_id: u64) -> Result<Vec<String>> {
        let key = keys::entity_tags(entity_id);
        if let Some(tags) = self.cache.get_all(&key).await?.into_members() {
            debug!(key = %key, "cache hit");
            return Ok(tags);
        }

        self.lock
            .with_lock(key.as_str(), self.renew_interval, async {
                if let Some(tags) = self.cache.get_all(&key).await?.into_members() {
                    debug!(key = %key, "cache hit after lock wait");
                    return Ok(tags);
                }
                let tags = self.repository.get_tags_by_entity(entity_id).await?;
                self.populate_members(&key, &tags).await?;
                Ok(tags)
            })
            .await
    }

    /// Entity ids of one type a user filed under a tag.
    #[instrument(skip(self))]
    pub async fn get_entities_by_tag(
        &self,
        user_id: u64,
        tag: &str,
        entity_type: EntityType,
    ) -> Result<Vec<u64>> {
        let key = keys::user_tag_entities(user_id, tag, entity_type);
        if let Some(entities) = self.cache.get_all_ids(&key).await?.into_members() {
            debug!(key = %key, "cache hit");
            return Ok(entities);
        }

        self.lock
            .with_lock(key.as_str(), self.renew_interval, async {
                if let Some(entities) = self.cache.get_all_ids(&key).await?.into_members() {
                    debug!(key = %key, "cache hit after lock wait");
                    return Ok(entities);
                }
                let entities = self
                    .repository
                    .get_entities_by_tag(user_id, tag, entity_type)
                    .await?;
                self.populate_ids(&key, &entities).await?;
                Ok(entities)
            })
            .await
    }

    async fn populate_members(&self, key: &CacheKey, members: &[String]) -> Result<()> {
        if members.is_empty() {
            self.cache
                .populate_known_empty(key, Some(self.cache_ttl))
                .await
        } else {
            self.cache.populate(key, Some(self.cache_ttl), members).await
        }
    }

    async fn populate_ids(&self, key: &CacheKey, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            self.cache
                .populate_known_empty(key, Some(self.cache_ttl))
                .await
        } else {
            self.cache.populate_ids(key, Some(self.cache_ttl), ids).await
        }
    }

    // ------------------------------------------------------------------
    // Invalidation path
    // ------------------------------------------------------------------

    /// Invalidate a user's tag list. With propagation, fans out one
    /// tag-invalidation per held tag, then one entity-list invalidation per
    /// (tag, supported type) pair, all with propagation disabled.
    #[instrument(skip(self))]
    pub async fn invalidate_user_cache(&self, user_id: u64, propagate: bool) -> Result<()> {
        let key = keys::user_tags(user_id);
        let tags = match self.cache.get_all(&key).await? {
            CacheReadResult::Found(tags) => tags,
            CacheReadResult::KnownEmpty => Vec::new(),
            CacheReadResult::Absent => {
                debug!(key = %key, "nothing cached; invalidation is a no-op");
                return Ok(());
            }
        };

        if propagate {
            for tag in &tags {
                self.enqueue(InvalidationMessage::tag(tag.clone())).await?;
            }
            for tag in &tags {
                for entity_type in &self.supported_types {
                    self.enqueue(InvalidationMessage::entity(user_id, tag.clone(), *entity_type))
                        .await?;
                }
            }
        }

        self.cache.clear(&key, self.clear_retries).await
    }

    /// Invalidate a tag's user list. With propagation, fans out one
    /// user-invalidation per cached holder, then one entity-list
    /// invalidation per (user, supported type) pair.
    #[instrument(skip(self))]
    pub async fn invalidate_tag_cache(&self, tag: &str, propagate: bool) -> Result<()> {
        let key = keys::tag_users(tag);
        let users = match self.cache.get_all_ids(&key).await? {
            CacheReadResult::Found(users) => users,
            CacheReadResult::KnownEmpty => Vec::new(),
            CacheReadResult::Absent => {
                debug!(key = %key, "nothing cached; invalidation is a no-op");
                return Ok(());
            }
        };

        if propagate {
            for user_id in &users {
                self.enqueue(InvalidationMessage::user(*user_id)).await?;
            }
            for user_id in &users {
                for entity_type in &self.supported_types {
                    self.enqueue(InvalidationMessage::entity(*user_id, tag, *entity_type))
                        .await?;
                }
            }
        }

        self.cache.clear(&key, self.clear_retries).await
    }

    /// Invalidate one (user, tag, entity type) entity list. A leaf
    /// dimension: no dependent caches, so nothing is enqueued.
    #[instrument(skip(self))]
    pub async fn invalidate_user_tag_cache(
        &self,
        user_id: u64,
        tag: &str,
        entity_type: EntityType,
        propagate: bool,
    ) -> Result<()> {
        let key = keys::user_tag_entities(user_id, tag, entity_type);
        if self.cache.get_all_ids(&key).await? == CacheReadResult::Absent {
            debug!(key = %key, "nothing cached; invalidation is a no-op");
            return Ok(());
        }

        if propagate {
            debug!(key = %key, "entity lists are a leaf dimension; nothing to propagate");
        }

        self.cache.clear(&key, self.clear_retries).await
    }

    /// Invalidate an entity's tag list. With propagation, fans out one
    /// tag-invalidation per cached tag.
    #[instrument(skip(self))]
    pub async fn invalidate_entity_cache(&self, entity_id: u64, propagate: bool) -> Result<()> {
        let key = keys::entity_tags(entity_id);
        let tags = match self.cache.get_all(&key).await? {
            CacheReadResult::Found(tags) => tags,
            CacheReadResult::KnownEmpty => Vec::new(),
            CacheReadResult::Absent => {
                debug!(key = %key, "nothing cached; invalidation is a no-op");
                return Ok(());
            }
        };

        if propagate {
            for tag in &tags {
                self.enqueue(InvalidationMessage::tag(tag.clone())).await?;
            }
        }

        self.cache.clear(&key, self.clear_retries).await
    }

    // ------------------------------------------------------------------
    // Worker integration
    // ------------------------------------------------------------------

    /// Route a consumed queue message to the matching invalidation method.
    pub async fn dispatch_invalidation(&self, message: InvalidationMessage) -> Result<()> {
        match message.action {
            InvalidationAction::InvalidateUser => {
                let user_id = message.user_id.ok_or_else(|| {
                    TaggerError::invalid_state("invalidate_user message missing user_id")
                })?;
                self.invalidate_user_cache(user_id, message.propagate).await
            }
            InvalidationAction::InvalidateTag => {
                let tag = message.tag.as_deref().ok_or_else(|| {
                    TaggerError::invalid_state("invalidate_tag message missing tag")
                })?;
                self.invalidate_tag_cache(tag, message.propagate).await
            }
            InvalidationAction::InvalidateEntity => {
                let user_id = message.user_id.ok_or_else(|| {
                    TaggerError::invalid_state("invalidate_entity message missing user_id")
                })?;
                let tag = message.tag.as_deref().ok_or_else(|| {
                    TaggerError::invalid_state("invalidate_entity message missing tag")
                })?;
                let entity_type = message.entity_type.ok_or_else(|| {
                    TaggerError::invalid_state("invalidate_entity message missing entity_type")
                })?;
                self.invalidate_user_tag_cache(user_id, tag, entity_type, message.propagate)
                    .await
            }
        }
    }

    /// Handler callback for [`crate::worker::InvalidationWorker::start`].
    pub fn invalidation_handler(self: &Arc<Self>) -> InvalidationHandler {
        let service = Arc::clone(self);
        Arc::new(move |message: InvalidationMessage| {
            let service = Arc::clone(&service);
            Box::pin(async move { service.dispatch_invalidation(message).await })
        })
    }

    async fn enqueue(&self, message: InvalidationMessage) -> Result<()> {
        let payload = message
            .to_json()
            .map_err(|e| TaggerError::message_serialization(e.to_string()))?;
        self.producer.put(payload).await
    }
}
