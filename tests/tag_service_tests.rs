//! Tag service behavior: stampede-safe reads, fan-out arithmetic,
//! invalidation idempotence, and the end-to-end populate/invalidate cycle.

mod common;

use common::{build_stack, MockTagRepository};
use std::sync::Arc;
use tagger_core::messaging::{InvalidationAction, InvalidationMessage};
use tagger_core::models::EntityType;
use tagger_core::store::CacheStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_readers_trigger_single_rebuild() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_user_tags(42, &["x", "y"]);
    let (_store, _queue, service) = build_stack(repository.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.get_tags_by_user(42).await.unwrap()
        }));
    }

    for handle in handles {
        let mut tags = handle.await.unwrap();
        tags.sort();
        assert_eq!(tags, vec!["x", "y"]);
    }

    // All eight callers observed the same value from one repository fetch
    assert_eq!(repository.fetch_count(), 1);
}

#[tokio::test]
async fn test_read_populates_cache_directly() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_user_tags(42, &["x", "y"]);
    let (store, _queue, service) = build_stack(repository.clone());

    let mut tags = service.get_tags_by_user(42).await.unwrap();
    tags.sort();
    assert_eq!(tags, vec!["x", "y"]);

    let mut cached = store.smembers("users:42:tags").await.unwrap();
    cached.sort();
    assert_eq!(cached, vec!["x", "y"]);

    // Second read is served from cache
    service.get_tags_by_user(42).await.unwrap();
    assert_eq!(repository.fetch_count(), 1);
}

#[tokio::test]
async fn test_empty_repository_result_is_cached_as_known_empty() {
    let repository = Arc::new(MockTagRepository::new());
    let (_store, _queue, service) = build_stack(repository.clone());

    assert!(service.get_tags_by_user(7).await.unwrap().is_empty());
    assert_eq!(repository.fetch_count(), 1);

    // The tombstone keeps the second read off the repository
    assert!(service.get_tags_by_user(7).await.unwrap().is_empty());
    assert_eq!(repository.fetch_count(), 1);
}

#[tokio::test]
async fn test_typed_read_directions() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_users_for_tag("fire", &[1, 2]);
    repository.set_entity_tags(1001, &["fire", "ancient"]);
    repository.set_entities(1, "fire", EntityType::Book, &[1001, 1002]);
    let (_store, _queue, service) = build_stack(repository);

    let mut users = service.get_users_by_tag("fire").await.unwrap();
    users.sort_unstable();
    assert_eq!(users, vec![1, 2]);

    let mut tags = service.get_tags_by_entity(1001).await.unwrap();
    tags.sort();
    assert_eq!(tags, vec!["ancient", "fire"]);

    let mut entities = service
        .get_entities_by_tag(1, "fire", EntityType::Book)
        .await
        .unwrap();
    entities.sort_unstable();
    assert_eq!(entities, vec![1001, 1002]);
}

#[tokio::test]
async fn test_user_invalidation_fan_out_arithmetic() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_user_tags(42, &["a", "b"]);
    let (store, queue, service) = build_stack(repository);

    service.get_tags_by_user(42).await.unwrap();
    assert_eq!(queue.ready_len(), 0);

    service.invalidate_user_cache(42, true).await.unwrap();

    // 2 tags => 2 tag messages, then 2 tags x 2 supported types => 4 entity
    // messages
    let payloads = queue.ready_payloads();
    assert_eq!(payloads.len(), 6);

    let messages: Vec<InvalidationMessage> = payloads
        .iter()
        .map(|p| InvalidationMessage::from_json(p).unwrap())
        .collect();

    let tag_messages: Vec<_> = messages
        .iter()
        .filter(|m| m.action == InvalidationAction::InvalidateTag)
        .collect();
    let entity_messages: Vec<_> = messages
        .iter()
        .filter(|m| m.action == InvalidationAction::InvalidateEntity)
        .collect();
    assert_eq!(tag_messages.len(), 2);
    assert_eq!(entity_messages.len(), 4);

    // Tag messages come before entity messages; propagation is never
    // re-enabled on fan-out
    assert_eq!(messages[0].action, InvalidationAction::InvalidateTag);
    assert_eq!(messages[1].action, InvalidationAction::InvalidateTag);
    assert!(messages.iter().all(|m| !m.propagate));

    // Each entity message targets this user and one (tag, type) pair
    for message in &entity_messages {
        assert_eq!(message.user_id, Some(42));
        assert!(message.entity_type.is_some());
        assert!(message.tag.is_some());
    }

    // The user's own key was cleared, after the messages were enqueued
    assert!(store.smembers("users:42:tags").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalidation_is_idempotent() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_user_tags(42, &["a", "b"]);
    let (_store, queue, service) = build_stack(repository);

    service.get_tags_by_user(42).await.unwrap();
    service.invalidate_user_cache(42, true).await.unwrap();
    let after_first = queue.ready_len();
    assert_eq!(after_first, 6);

    // Nothing cached anymore: no error, no duplicate propagation
    service.invalidate_user_cache(42, true).await.unwrap();
    assert_eq!(queue.ready_len(), after_first);
}

#[tokio::test]
async fn test_tag_invalidation_fans_out_to_holders() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_users_for_tag("fire", &[1, 2]);
    let (store, queue, service) = build_stack(repository);

    service.get_users_by_tag("fire").await.unwrap();
    service.invalidate_tag_cache("fire", true).await.unwrap();

    // 2 holders => 2 user messages, then 2 users x 2 types => 4 entity
    // messages
    let messages: Vec<InvalidationMessage> = queue
        .ready_payloads()
        .iter()
        .map(|p| InvalidationMessage::from_json(p).unwrap())
        .collect();
    assert_eq!(messages.len(), 6);
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.action == InvalidationAction::InvalidateUser)
            .count(),
        2
    );
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.action == InvalidationAction::InvalidateEntity)
            .count(),
        4
    );

    assert!(store.smembers("tags:fire:users").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_entity_invalidation_fans_out_to_tags() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_entity_tags(1001, &["fire", "ancient"]);
    let (store, queue, service) = build_stack(repository);

    service.get_tags_by_entity(1001).await.unwrap();
    service.invalidate_entity_cache(1001, true).await.unwrap();

    let messages: Vec<InvalidationMessage> = queue
        .ready_payloads()
        .iter()
        .map(|p| InvalidationMessage::from_json(p).unwrap())
        .collect();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .all(|m| m.action == InvalidationAction::InvalidateTag));

    assert!(store.smembers("entities:1001:tags").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_tag_invalidation_is_a_leaf() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_entities(42, "fire", EntityType::Item, &[7]);
    let (store, queue, service) = build_stack(repository);

    service
        .get_entities_by_tag(42, "fire", EntityType::Item)
        .await
        .unwrap();
    service
        .invalidate_user_tag_cache(42, "fire", EntityType::Item, true)
        .await
        .unwrap();

    // Leaf dimension: cleared without enqueueing anything
    assert_eq!(queue.ready_len(), 0);
    assert!(store
        .smembers("users:42:tags:fire:item")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_dispatch_invalidation_routes_by_action() {
    let repository = Arc::new(MockTagRepository::new());
    repository.set_user_tags(42, &["a"]);
    let (store, queue, service) = build_stack(repository);

    service.get_tags_by_user(42).await.unwrap();
    service
        .dispatch_invalidation(InvalidationMessage::user(42))
        .await
        .unwrap();

    // Propagation was off, so the clear happened without fan-out
    assert_eq!(queue.ready_len(), 0);
    assert!(store.smembers("users:42:tags").await.unwrap().is_empty());

    // Messages missing their required fields are rejected
    let mut broken = InvalidationMessage::user(42);
    broken.user_id = None;
    assert!(service.dispatch_invalidation(broken).await.is_err());
}
