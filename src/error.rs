//! # Error Types
//!
//! Structured error handling for the tag cache core using thiserror
//! instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Errors produced by the cache-consistency core.
#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("Failed to acquire lock on {key} after {attempts} attempts")]
    LockAcquireFailed { key: String, attempts: u32 },

    #[error("Failed to release lock on {key}: token no longer matches")]
    LockReleaseFailed { key: String },

    #[error("Cache store error: {operation}: {message}")]
    Store { operation: String, message: String },

    #[error("Queue operation failed: {operation}: {message}")]
    Queue { operation: String, message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Repository error: {message}")]
    Repository { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl TaggerError {
    /// Create a cache store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Queue {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a message deserialization error
    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    /// Create a repository error
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Whether this error is worth retrying at the call site.
    ///
    /// Malformed payloads and configuration problems cannot self-correct;
    /// store and queue errors are transient by assumption.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Queue { .. })
    }
}

/// Conversion from serde_json::Error to TaggerError
impl From<serde_json::Error> for TaggerError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            TaggerError::message_deserialization(err.to_string())
        } else {
            TaggerError::message_serialization(err.to_string())
        }
    }
}

/// Result type alias for tag cache operations
pub type Result<T> = std::result::Result<T, TaggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let store_err = TaggerError::store("smembers", "connection refused");
        assert!(matches!(store_err, TaggerError::Store { .. }));

        let queue_err = TaggerError::queue("put", "queue full");
        assert!(matches!(queue_err, TaggerError::Queue { .. }));

        let lock_err = TaggerError::LockAcquireFailed {
            key: "users:1:tags".to_string(),
            attempts: 5,
        };
        assert!(matches!(lock_err, TaggerError::LockAcquireFailed { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = TaggerError::LockAcquireFailed {
            key: "users:1:tags".to_string(),
            attempts: 5,
        };
        let display = format!("{err}");
        assert!(display.contains("users:1:tags"));
        assert!(display.contains("5 attempts"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: TaggerError = json_err.into();
        assert!(matches!(err, TaggerError::MessageDeserialization { .. }));
    }

    #[test]
    fn test_transient_classification() {
        assert!(TaggerError::store("del", "timeout").is_transient());
        assert!(!TaggerError::message_deserialization("bad payload").is_transient());
        assert!(!TaggerError::configuration("bad ttl").is_transient());
    }
}
