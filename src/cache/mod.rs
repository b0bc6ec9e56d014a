//! # Cache Layer
//!
//! Cache key schemas for the four tag-index query directions and the
//! stampede-safe set cache they are stored through.

pub mod keys;
pub mod set_cache;

pub use keys::CacheKey;
pub use set_cache::{CacheReadResult, SetCache};
