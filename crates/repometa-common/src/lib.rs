//! RepoMeta Common - Shared types and utilities
//!
//! This crate provides the schema descriptor types, error definitions,
//! configuration and the query-executor abstraction used across all
//! RepoMeta components.

pub mod config;
pub mod error;
pub mod query;
pub mod types;

pub use self::config::{AuditConfig, ClientConfig, Config, MetadataConfig};
pub use error::{Error, Result, ToolError, ToolErrorKind};
pub use query::{QueryError, QueryErrorDetail, QueryExecutor, QueryResponse};
pub use types::*;
