//! Queue producer/consumer contracts.
//!
//! Delivery is at-least-once: a message may arrive more than once, so
//! handlers must be idempotent. Acknowledgement is per consumer; a delivery
//! that is neither acked, failed, nor requeued stays in-flight and is
//! surfaced again through [`QueueConsumer::get_unacked`].

use crate::error::Result;
use async_trait::async_trait;

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Queue-assigned message id.
    pub id: i64,
    /// Serialized message payload.
    pub payload: String,
    /// How many times this message has been delivered, this delivery
    /// included.
    pub delivery_attempts: u32,
}

/// Producer side of the queue.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Enqueue a serialized payload. Synchronous from the caller's point of
    /// view: errors surface directly, retries are the caller's decision.
    async fn put(&self, payload: String) -> Result<()>;
}

/// Consumer side of the queue.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Fetch the next message, moving it in-flight. `None` when empty.
    async fn get(&self) -> Result<Option<Delivery>>;

    /// Fetch up to `count` messages, each moved in-flight.
    async fn mget(&self, count: usize) -> Result<Vec<Delivery>>;

    /// The oldest outstanding unacknowledged message, or `None`. The empty
    /// case is a defined result, never a transport error.
    async fn get_unacked(&self) -> Result<Option<Delivery>>;

    /// Acknowledge successful processing; the message is gone for good.
    async fn ack(&self, id: i64) -> Result<()>;

    /// Drop the message permanently (dead-letter).
    async fn fail(&self, id: i64) -> Result<()>;

    /// Return the message to the front of the queue for redelivery.
    async fn requeue(&self, id: i64) -> Result<()>;
}
