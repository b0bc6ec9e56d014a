//! Tag association model and repository contract.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of entity kinds that can carry tags.
///
/// Fan-out loops over supported types iterate an explicit registry slice
/// passed at service construction, never an open type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Book,
    Item,
    Dungeon,
}

impl EntityType {
    /// Every entity type the application knows about.
    pub const ALL: [EntityType; 3] = [EntityType::Book, EntityType::Item, EntityType::Dungeon];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Book => "book",
            EntityType::Item => "item",
            EntityType::Dungeon => "dungeon",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "book" => Ok(EntityType::Book),
            "item" => Ok(EntityType::Item),
            "dungeon" => Ok(EntityType::Dungeon),
            _ => Err(format!("Unknown entity type: {s}")),
        }
    }
}

/// One user-tag-entity association.
///
/// A given (user, tag, entity) triple is unique among non-deleted rows;
/// deletion is soft, via `deleted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub user_id: u64,
    pub tag: String,
    pub entity_type: EntityType,
    pub entity_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tag {
    pub fn new(user_id: u64, tag: impl Into<String>, entity_type: EntityType, entity_id: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            tag: tag.into(),
            entity_type,
            entity_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Read-only view of the relational store of record.
///
/// The cache core never writes back through this trait; implementations live
/// with the persistence layer of the host application.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Look up a single tag association by name.
    async fn get_tag(&self, tag: &str) -> Result<Option<Tag>>;

    /// All users holding the given tag.
    async fn get_users_by_tag(&self, tag: &str) -> Result<Vec<u64>>;

    /// All tag names a user has applied.
    async fn get_tags_by_user(&self, user_id: u64) -> Result<Vec<String>>;

    /// All tag names applied to an entity.
    async fn get_tags_by_entity(&self, entity_id: u64) -> Result<Vec<String>>;

    /// All entities of one type a user has filed under a tag.
    async fn get_entities_by_tag(
        &self,
        user_id: u64,
        tag: &str,
        entity_type: EntityType,
    ) -> Result<Vec<u64>>;
}
