//! RepoMeta Client - Remote repository query service
//!
//! `GraphqlClient` implements `QueryExecutor` by POSTing GraphQL requests
//! over HTTP and records every attempt in an optional `AuditLogger`.

pub mod graphql;

pub use graphql::GraphqlClient;
