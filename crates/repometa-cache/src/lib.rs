//! RepoMeta Cache - Repository schema metadata
//!
//! This crate provides:
//! - `MetadataCache`: class descriptors grouped by root class
//! - `MetadataLoader`: root-class discovery and per-class property hydration
//!   on top of a `QueryExecutor`

pub mod loader;
pub mod metadata;

pub use loader::MetadataLoader;
pub use metadata::MetadataCache;
