//! Retry policy for failed message deliveries.
//!
//! The worker asks the policy whether a delivery whose handler failed should
//! go back on the queue or be dropped. Malformed payloads never reach the
//! policy; they are failed outright since redelivery cannot fix them.

use crate::error::TaggerError;
use crate::messaging::queue::Delivery;

/// Decides requeue-or-fail for handler failures.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, delivery: &Delivery, error: &TaggerError) -> bool;
}

/// Requeue every handler failure. The reference behavior: conservative in
/// that no invalidation is ever dropped, crude in that a deterministic
/// failure loops forever. Prefer [`BoundedAttempts`] where poison messages
/// are a concern.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRequeue;

impl RetryPolicy for AlwaysRequeue {
    fn should_retry(&self, _delivery: &Delivery, _error: &TaggerError) -> bool {
        true
    }
}

/// Requeue until a delivery has been attempted `max_attempts` times, then
/// drop it.
#[derive(Debug, Clone, Copy)]
pub struct BoundedAttempts {
    pub max_attempts: u32,
}

impl BoundedAttempts {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl RetryPolicy for BoundedAttempts {
    fn should_retry(&self, delivery: &Delivery, error: &TaggerError) -> bool {
        // Non-transient errors repeat identically on redelivery
        if !error.is_transient() {
            return false;
        }
        delivery.delivery_attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(attempts: u32) -> Delivery {
        Delivery {
            id: 1,
            payload: "{}".to_string(),
            delivery_attempts: attempts,
        }
    }

    #[test]
    fn test_always_requeue_never_drops() {
        let policy = AlwaysRequeue;
        let err = TaggerError::repository("down");
        assert!(policy.should_retry(&delivery(1), &err));
        assert!(policy.should_retry(&delivery(1000), &err));
    }

    #[test]
    fn test_bounded_attempts_caps_transient_errors() {
        let policy = BoundedAttempts::new(3);
        let err = TaggerError::store("del", "timeout");
        assert!(policy.should_retry(&delivery(1), &err));
        assert!(policy.should_retry(&delivery(2), &err));
        assert!(!policy.should_retry(&delivery(3), &err));
    }

    #[test]
    fn test_bounded_attempts_drops_permanent_errors_immediately() {
        let policy = BoundedAttempts::new(3);
        let err = TaggerError::invalid_state("missing user_id");
        assert!(!policy.should_retry(&delivery(1), &err));
    }
}
