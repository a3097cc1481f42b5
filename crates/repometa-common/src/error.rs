//! Error types for RepoMeta
//!
//! `Error` covers local failures (audit file I/O, configuration,
//! serialization). `ToolError` is the typed failure value handed back to
//! tool callers: it carries a message plus remediation suggestions and
//! never represents a process-fatal condition.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Common result type for RepoMeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for RepoMeta
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is an I/O error
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// Category of a tool failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ToolErrorKind {
    /// The remote service returned no data for the requested class or root
    #[display("not_found")]
    NotFound,
    /// The remote service (or the path to it) reported an error
    #[display("remote_failure")]
    RemoteFailure,
    /// Anything else, e.g. a response that could not be interpreted
    #[display("unexpected")]
    Unexpected,
}

/// Typed failure returned by metadata operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    /// Create a remote-failure error
    pub fn remote_failure(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::RemoteFailure, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Unexpected, message)
    }

    /// Attach remediation suggestions
    #[must_use]
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    /// Check if this is a not-found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ToolErrorKind::NotFound
    }
}

impl Serialize for ToolError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ToolError", 4)?;
        state.serialize_field("isError", &true)?;
        state.serialize_field("kind", &self.kind.to_string())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("suggestions", &self.suggestions)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::not_found("Class 'Invoice' not found")
            .with_suggestions(["Check the class name"]);
        assert_eq!(err.to_string(), "Class 'Invoice' not found");
        assert!(err.is_not_found());
        assert_eq!(err.suggestions, vec!["Check the class name".to_string()]);
    }

    #[test]
    fn test_tool_error_json() {
        let err = ToolError::remote_failure("boom").with_suggestions(["retry"]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["kind"], "remote_failure");
        assert_eq!(json["message"], "boom");
        assert_eq!(json["suggestions"][0], "retry");
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = std::io::Error::other("disk gone").into();
        assert!(err.is_io());
        assert!(err.to_string().contains("disk gone"));
    }
}
