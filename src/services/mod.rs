//! # Service Layer
//!
//! The tag service: cache-aside reads over the four tag-index query
//! directions and the invalidation fan-out that keeps them consistent.

pub mod tag_service;

pub use tag_service::TagService;
