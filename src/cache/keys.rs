//! Cache key schemas.
//!
//! One explicit builder per query direction; building a key from parameters
//! is pure and deterministic. Four schemas index the four directions of the
//! tag index.

use crate::models::EntityType;
use std::fmt;

/// A fully-built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// user → tag names: `users:{uid}:tags`
pub fn user_tags(user_id: u64) -> CacheKey {
    CacheKey(format!("users:{user_id}:tags"))
}

/// tag → user ids: `tags:{tag}:users`
pub fn tag_users(tag: &str) -> CacheKey {
    CacheKey(format!("tags:{tag}:users"))
}

/// entity → tag names: `entities:{eid}:tags`
pub fn entity_tags(entity_id: u64) -> CacheKey {
    CacheKey(format!("entities:{entity_id}:tags"))
}

/// (user, tag, entity type) → entity ids: `users:{uid}:tags:{tag}:{etype}`
pub fn user_tag_entities(user_id: u64, tag: &str, entity_type: EntityType) -> CacheKey {
    CacheKey(format!(
        "users:{user_id}:tags:{tag}:{}",
        entity_type.as_str()
    ))
}
