//! Query-executor abstraction
//!
//! The metadata loader never talks to the network directly. It hands a
//! query text plus variables to a `QueryExecutor` and receives either a
//! structured response or a typed failure.

use crate::types::Operation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One error reported inside an otherwise well-formed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryErrorDetail {
    pub message: String,
}

/// Structured result of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Payload shaped like the request
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Errors reported by the server
    #[serde(default)]
    pub errors: Vec<QueryErrorDetail>,
}

impl QueryResponse {
    /// Create a successful response carrying `data`
    #[must_use]
    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Create a response that reports a single error
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: vec![QueryErrorDetail {
                message: message.into(),
            }],
        }
    }

    /// Check if the server reported any error
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All reported error messages joined into one line
    #[must_use]
    pub fn error_message(&self) -> String {
        if self.errors.is_empty() {
            return "Unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Failure to obtain a response at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("request timeout")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,
}

impl QueryError {
    /// Check if this is a retryable error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

/// Executes queries against the remote repository service
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Repository (object store) identifier queries are scoped to
    fn object_store(&self) -> &str;

    /// Execute a query with the given variables
    ///
    /// `operation` classifies the request for audit purposes.
    async fn execute(
        &self,
        operation: Operation,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<QueryResponse, QueryError>;
}
