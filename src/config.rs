//! # Runtime Configuration
//!
//! Environment-derived configuration for the cache core. Defaults come from
//! [`crate::constants::defaults`]; every knob can be overridden with a
//! `TAGGER_*` environment variable.

use crate::constants::defaults;
use crate::error::{Result, TaggerError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TaggerConfig {
    pub redis_url: String,
    pub max_lock_retries: u32,
    pub lock_retry_interval_ms: u64,
    pub max_cache_clear_retries: u32,
    pub cache_ttl_secs: u64,
    pub read_lock_ttl_secs: u64,
    pub worker_batch_size: usize,
    pub worker_poll_interval_ms: u64,
    pub worker_max_fetch_errors: u32,
    pub worker_error_backoff_ms: u64,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            max_lock_retries: defaults::MAX_LOCK_RETRIES,
            lock_retry_interval_ms: defaults::LOCK_RETRY_INTERVAL_MS,
            max_cache_clear_retries: defaults::MAX_CACHE_CLEAR_RETRIES,
            cache_ttl_secs: defaults::CACHE_TTL_SECS,
            read_lock_ttl_secs: defaults::READ_LOCK_TTL_SECS,
            worker_batch_size: defaults::WORKER_BATCH_SIZE,
            worker_poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            worker_max_fetch_errors: defaults::WORKER_MAX_FETCH_ERRORS,
            worker_error_backoff_ms: defaults::WORKER_ERROR_BACKOFF_MS,
        }
    }
}

impl TaggerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("TAGGER_REDIS_URL") {
            config.redis_url = url;
        }

        if let Ok(retries) = std::env::var("TAGGER_MAX_LOCK_RETRIES") {
            config.max_lock_retries = retries.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid max_lock_retries: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("TAGGER_LOCK_RETRY_INTERVAL_MS") {
            config.lock_retry_interval_ms = interval.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid lock_retry_interval_ms: {e}"))
            })?;
        }

        if let Ok(retries) = std::env::var("TAGGER_MAX_CACHE_CLEAR_RETRIES") {
            config.max_cache_clear_retries = retries.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid max_cache_clear_retries: {e}"))
            })?;
        }

        if let Ok(ttl) = std::env::var("TAGGER_CACHE_TTL_SECS") {
            config.cache_ttl_secs = ttl.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid cache_ttl_secs: {e}"))
            })?;
        }

        if let Ok(ttl) = std::env::var("TAGGER_READ_LOCK_TTL_SECS") {
            config.read_lock_ttl_secs = ttl.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid read_lock_ttl_secs: {e}"))
            })?;
        }

        if let Ok(size) = std::env::var("TAGGER_WORKER_BATCH_SIZE") {
            config.worker_batch_size = size.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid worker_batch_size: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("TAGGER_WORKER_POLL_INTERVAL_MS") {
            config.worker_poll_interval_ms = interval.parse().map_err(|e| {
                TaggerError::configuration(format!("Invalid worker_poll_interval_ms: {e}"))
            })?;
        }

        Ok(config)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn read_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.read_lock_ttl_secs)
    }

    /// Watchdog renewal cadence: a third of the lock TTL, so two renewals can
    /// fail before the lock is lost.
    pub fn lock_renew_interval(&self) -> Duration {
        Duration::from_secs((self.read_lock_ttl_secs / 3).max(1))
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn worker_error_backoff(&self) -> Duration {
        Duration::from_millis(self.worker_error_backoff_ms)
    }
}
