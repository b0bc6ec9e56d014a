//! In-memory implementation of the [`CacheStore`] contract.
//!
//! Backed by a DashMap whose per-shard locking makes each single-key
//! operation atomic, which is all the lock primitives require. Used by the
//! test suite and by single-process deployments that do not need a shared
//! store.

use crate::error::{Result, TaggerError};
use crate::store::CacheStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum StoreEntry {
    Value {
        value: String,
        expires_at: Option<Instant>,
    },
    Set {
        members: HashSet<String>,
        expires_at: Option<Instant>,
    },
}

impl StoreEntry {
    fn is_expired(&self) -> bool {
        let expires_at = match self {
            StoreEntry::Value { expires_at, .. } | StoreEntry::Set { expires_at, .. } => expires_at,
        };
        expires_at.is_some_and(|at| Instant::now() >= at)
    }

    fn set_ttl(&mut self, ttl: Duration) {
        let deadline = Some(Instant::now() + ttl);
        match self {
            StoreEntry::Value { expires_at, .. } | StoreEntry::Set { expires_at, .. } => {
                *expires_at = deadline;
            }
        }
    }
}

/// DashMap-backed cache store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoreEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) keys; test observability helper.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop an expired entry so later reads see a clean miss.
    fn purge_if_expired(&self, key: &str) -> bool {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.purge_if_expired(key) {
            return Ok(None);
        }
        match self.entries.get(key).as_deref() {
            None => Ok(None),
            Some(StoreEntry::Value { value, .. }) => Ok(Some(value.clone())),
            Some(StoreEntry::Set { .. }) => Err(TaggerError::store("get", "wrong type: set")),
        }
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(StoreEntry::Value {
                        value: value.to_string(),
                        expires_at: Some(Instant::now() + ttl),
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry::Value {
                    value: value.to_string(),
                    expires_at: Some(Instant::now() + ttl),
                });
                Ok(true)
            }
        }
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.purge_if_expired(key);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                StoreEntry::Set {
                    members: existing, ..
                } => {
                    existing.extend(members.iter().cloned());
                    Ok(())
                }
                StoreEntry::Value { .. } => Err(TaggerError::store("sadd", "wrong type: string")),
            },
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry::Set {
                    members: members.iter().cloned().collect(),
                    expires_at: None,
                });
                Ok(())
            }
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        if self.purge_if_expired(key) {
            return Ok(Vec::new());
        }
        match self.entries.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(StoreEntry::Set { members, .. }) => Ok(members.iter().cloned().collect()),
            Some(StoreEntry::Value { .. }) => {
                Err(TaggerError::store("smembers", "wrong type: string"))
            }
        }
    }

    async fn del(&self, key: &str) -> Result<u64> {
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired() => Ok(1),
            _ => Ok(0),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        if self.purge_if_expired(key) {
            return Ok(false);
        }
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.set_ttl(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<u64> {
        let removed = self.entries.remove_if(key, |_, entry| {
            matches!(entry, StoreEntry::Value { value, .. }
                if value == expected && !entry.is_expired())
        });
        Ok(u64::from(removed.is_some()))
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                let matches = matches!(entry.value(), StoreEntry::Value { value, .. }
                    if value == expected && !entry.value().is_expired());
                if matches {
                    entry.set_ttl(ttl);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(false),
        }
    }
}
