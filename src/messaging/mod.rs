//! # Messaging Layer
//!
//! Invalidation message format, the producer/consumer queue contracts the
//! worker is built on, the retry policy applied to failed deliveries, and an
//! in-memory queue for tests and in-process wiring.

pub mod memory;
pub mod message;
pub mod queue;
pub mod retry;

pub use memory::MemoryQueue;
pub use message::{InvalidationAction, InvalidationMessage};
pub use queue::{Delivery, QueueConsumer, QueueProducer};
pub use retry::{AlwaysRequeue, BoundedAttempts, RetryPolicy};
