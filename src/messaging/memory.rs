//! In-memory queue implementing both queue contracts.
//!
//! A deque of ready messages plus an in-flight list models the broker's
//! per-consumer unacknowledged tracking. Used by the test suite and by
//! single-process deployments.

use crate::error::Result;
use crate::messaging::queue::{Delivery, QueueConsumer, QueueProducer};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
struct QueueInner {
    ready: VecDeque<Delivery>,
    unacked: VecDeque<Delivery>,
    failed: Vec<Delivery>,
}

/// Deque-backed queue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<QueueInner>,
    next_id: AtomicI64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting for delivery.
    pub fn ready_len(&self) -> usize {
        self.inner.lock().ready.len()
    }

    /// Messages currently in-flight.
    pub fn unacked_len(&self) -> usize {
        self.inner.lock().unacked.len()
    }

    /// Messages dropped permanently.
    pub fn failed_len(&self) -> usize {
        self.inner.lock().failed.len()
    }

    /// Snapshot of the waiting payloads, front first. Test observability.
    pub fn ready_payloads(&self) -> Vec<String> {
        self.inner
            .lock()
            .ready
            .iter()
            .map(|d| d.payload.clone())
            .collect()
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn put(&self, payload: String) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.lock().ready.push_back(Delivery {
            id,
            payload,
            delivery_attempts: 0,
        });
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for MemoryQueue {
    async fn get(&self) -> Result<Option<Delivery>> {
        let mut inner = self.inner.lock();
        match inner.ready.pop_front() {
            Some(mut delivery) => {
                delivery.delivery_attempts += 1;
                inner.unacked.push_back(delivery.clone());
                Ok(Some(delivery))
            }
            None => Ok(None),
        }
    }

    async fn mget(&self, count: usize) -> Result<Vec<Delivery>> {
        let mut inner = self.inner.lock();
        let mut batch = Vec::new();
        while batch.len() < count {
            match inner.ready.pop_front() {
                Some(mut delivery) => {
                    delivery.delivery_attempts += 1;
                    inner.unacked.push_back(delivery.clone());
                    batch.push(delivery);
                }
                None => break,
            }
        }
        Ok(batch)
    }

    async fn get_unacked(&self) -> Result<Option<Delivery>> {
        Ok(self.inner.lock().unacked.front().cloned())
    }

    async fn ack(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.unacked.iter().position(|d| d.id == id) {
            Some(index) => {
                let _ = inner.unacked.remove(index);
            }
            None => debug!(msg_id = id, "ack for unknown delivery ignored"),
        }
        Ok(())
    }

    async fn fail(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.unacked.iter().position(|d| d.id == id) {
            Some(index) => {
                let delivery = inner.unacked.remove(index).expect("position was valid");
                inner.failed.push(delivery);
            }
            None => debug!(msg_id = id, "fail for unknown delivery ignored"),
        }
        Ok(())
    }

    async fn requeue(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.unacked.iter().position(|d| d.id == id) {
            Some(index) => {
                let delivery = inner.unacked.remove(index).expect("position was valid");
                inner.ready.push_front(delivery);
            }
            None => debug!(msg_id = id, "requeue for unknown delivery ignored"),
        }
        Ok(())
    }
}
