//! Distributed lock behavior over the in-memory store: mutual exclusion,
//! token ownership, and watchdog renewal.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tagger_core::error::TaggerError;
use tagger_core::lock::DistributedLock;
use tagger_core::store::{CacheStore, MemoryStore};
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquires_are_mutually_exclusive() {
    let store = Arc::new(MemoryStore::new());
    // Single attempt: the loser must not sneak in on a retry
    let lock = Arc::new(DistributedLock::new(
        store,
        1,
        Duration::from_millis(10),
        Duration::from_secs(10),
    ));

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let lock = lock.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            lock.acquire("contested", Duration::from_secs(10)).await
        }));
    }

    let mut successes = 0;
    let mut failures = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(TaggerError::LockAcquireFailed { .. }) => failures += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_second_acquire_succeeds_after_release() {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::new(
        store,
        1,
        Duration::from_millis(10),
        Duration::from_secs(10),
    );

    let token = lock.acquire("handoff", Duration::from_secs(10)).await.unwrap();
    assert!(lock.acquire("handoff", Duration::from_secs(10)).await.is_err());

    lock.release("handoff", token).await.unwrap();
    assert!(lock.acquire("handoff", Duration::from_secs(10)).await.is_ok());
}

#[tokio::test]
async fn test_second_acquire_succeeds_after_ttl_expiry() {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::new(
        store,
        1,
        Duration::from_millis(10),
        Duration::from_secs(10),
    );

    let _abandoned = lock
        .acquire("expiring", Duration::from_millis(50))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(lock
        .acquire("expiring", Duration::from_secs(10))
        .await
        .is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_watchdog_keeps_lock_alive_past_its_ttl() {
    let store = Arc::new(MemoryStore::new());
    // Lock TTL of 300ms, held task runs for 700ms: only renewal keeps it
    let lock = Arc::new(DistributedLock::new(
        store.clone(),
        1,
        Duration::from_millis(10),
        Duration::from_millis(300),
    ));

    let holder = {
        let lock = lock.clone();
        tokio::spawn(async move {
            lock.with_lock("long-job", Duration::from_millis(80), async {
                tokio::time::sleep(Duration::from_millis(700)).await;
                Ok::<_, TaggerError>(42)
            })
            .await
        })
    };

    // Well past the original TTL, the lock must still be held
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(lock.acquire("long-job", Duration::from_secs(5)).await.is_err());

    assert_eq!(holder.await.unwrap().unwrap(), 42);

    // After completion the lock was released, not left to expire
    assert!(store.get("lock:long-job").await.unwrap().is_none());
    assert!(lock.acquire("long-job", Duration::from_secs(5)).await.is_ok());
}

#[tokio::test]
async fn test_watchdog_stops_renewing_after_release() {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::new(
        store.clone(),
        1,
        Duration::from_millis(10),
        Duration::from_millis(200),
    );

    lock.with_lock("short-job", Duration::from_millis(50), async {
        Ok::<_, TaggerError>(())
    })
    .await
    .unwrap();

    // If a stray watchdog were still renewing, this key would reappear
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(store.get("lock:short-job").await.unwrap().is_none());
}
