//! Audit log entry

use chrono::{DateTime, Utc};
use repometa_common::Operation;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Record of one outbound query attempt
///
/// Entries are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    operation: Operation,
    start_time: DateTime<Utc>,
    #[serde(rename = "time_elapsed", serialize_with = "serialize_secs")]
    elapsed: Duration,
    query: String,
    response_code: Option<u16>,
}

impl AuditEntry {
    /// Create a new entry
    ///
    /// `response_code` is `None` when no response was received.
    pub fn new(
        operation: Operation,
        start_time: DateTime<Utc>,
        elapsed: Duration,
        query: impl Into<String>,
        response_code: Option<u16>,
    ) -> Self {
        Self {
            operation,
            start_time,
            elapsed,
            query: query.into(),
            response_code,
        }
    }

    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub const fn response_code(&self) -> Option<u16> {
        self.response_code
    }
}

/// Single-line form written to the audit file
impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - Time Elapsed: {:.3} seconds - Response Code: ",
            self.start_time.to_rfc3339(),
            self.operation,
            self.elapsed.as_secs_f64()
        )?;
        match self.response_code {
            Some(code) => write!(f, "{code}")?,
            None => f.write_str("none")?,
        }
        // Keep one entry per line even for multi-line query text
        write!(f, " - Query: {}", self.query.replace(['\r', '\n'], " "))
    }
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
