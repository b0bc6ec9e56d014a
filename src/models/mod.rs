//! # Data Model Layer
//!
//! Tag associations, the closed set of taggable entity types, and the
//! read-only repository contract the cache core consumes.

pub mod tag;

pub use tag::{EntityType, Tag, TagRepository};
