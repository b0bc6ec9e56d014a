//! Invalidation message format.
//!
//! One message per dependent cache dimension, produced by the tag service on
//! a propagating invalidation and consumed by the worker. Messages enqueued
//! during fan-out always carry `propagate: false`, capping the invalidation
//! cascade at one hop.

use crate::models::EntityType;
use serde::{Deserialize, Serialize};

/// Which cache dimension a message invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationAction {
    InvalidateUser,
    InvalidateTag,
    InvalidateEntity,
}

/// A queued cache-invalidation request.
///
/// Only the fields relevant to the action are set; the rest stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    pub action: InvalidationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub propagate: bool,
}

impl InvalidationMessage {
    /// Invalidate a user's tag list.
    pub fn user(user_id: u64) -> Self {
        Self {
            action: InvalidationAction::InvalidateUser,
            user_id: Some(user_id),
            entity_id: None,
            entity_type: None,
            tag: None,
            propagate: false,
        }
    }

    /// Invalidate a tag's user list.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            action: InvalidationAction::InvalidateTag,
            user_id: None,
            entity_id: None,
            entity_type: None,
            tag: Some(tag.into()),
            propagate: false,
        }
    }

    /// Invalidate one (user, tag, entity type) entity list.
    pub fn entity(user_id: u64, tag: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            action: InvalidationAction::InvalidateEntity,
            user_id: Some(user_id),
            entity_id: None,
            entity_type: Some(entity_type),
            tag: Some(tag.into()),
            propagate: false,
        }
    }

    /// Request one further hop of propagation when this message is handled.
    pub fn with_propagation(mut self) -> Self {
        self.propagate = true;
        self
    }

    /// Serialize for queue transport.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from queue transport.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_only_relevant_fields() {
        let msg = InvalidationMessage::user(42);
        assert_eq!(msg.action, InvalidationAction::InvalidateUser);
        assert_eq!(msg.user_id, Some(42));
        assert_eq!(msg.tag, None);
        assert!(!msg.propagate);

        let msg = InvalidationMessage::entity(42, "fire", EntityType::Item);
        assert_eq!(msg.action, InvalidationAction::InvalidateEntity);
        assert_eq!(msg.entity_type, Some(EntityType::Item));
        assert_eq!(msg.tag.as_deref(), Some("fire"));
    }

    #[test]
    fn test_json_round_trip_preserves_all_fields() {
        let msg = InvalidationMessage::entity(42, "ドラゴン", EntityType::Dungeon).with_propagation();

        let json = msg.to_json().unwrap();
        let back = InvalidationMessage::from_json(&json).unwrap();

        assert_eq!(msg, back);
        assert_eq!(back.tag.as_deref(), Some("ドラゴン"));
        assert!(back.propagate);
    }

    #[test]
    fn test_action_wire_names() {
        let json = InvalidationMessage::tag("fire").to_json().unwrap();
        assert!(json.contains(r#""action":"invalidate_tag""#));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        assert!(InvalidationMessage::from_json("{").is_err());
        assert!(InvalidationMessage::from_json(r#"{"action":"unknown_action","propagate":false}"#).is_err());
    }
}
