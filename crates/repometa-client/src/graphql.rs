//! GraphQL-over-HTTP query executor

use async_trait::async_trait;
use chrono::Utc;
use repometa_audit::{AuditEntry, AuditLogger};
use repometa_common::{
    ClientConfig, Error, Operation, QueryError, QueryExecutor, QueryResponse, Result,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// GraphQL request body
#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a serde_json::Value,
}

/// Query executor backed by a GraphQL endpoint
pub struct GraphqlClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    audit: Option<Arc<AuditLogger>>,
}

impl GraphqlClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(!config.ssl_enabled)
            .build()
            .map_err(|e| Error::configuration(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            audit: None,
        })
    }

    /// Record every query attempt in `audit`
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// The audit logger attempts are recorded in, if any
    #[must_use]
    pub const fn audit(&self) -> Option<&Arc<AuditLogger>> {
        self.audit.as_ref()
    }

    /// Endpoint queries are sent to
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    /// Send a request and return the outcome plus the HTTP status, if any
    async fn send(
        &self,
        query: &str,
        variables: &serde_json::Value,
    ) -> (std::result::Result<QueryResponse, QueryError>, Option<u16>) {
        let mut request = self
            .http_client
            .post(&self.config.server_url)
            .json(&GraphqlRequest { query, variables });
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return (Err(map_transport_error(&e)), None),
        };

        let status = response.status();
        let code = Some(status.as_u16());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return (Err(map_transport_error(&e)), code),
        };

        if !status.is_success() {
            return (
                Err(QueryError::Status {
                    code: status.as_u16(),
                    body,
                }),
                code,
            );
        }

        (parse_response(&body), code)
    }

    fn record(
        &self,
        operation: Operation,
        start_time: chrono::DateTime<Utc>,
        elapsed: Duration,
        query: &str,
        response_code: Option<u16>,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };
        let entry = AuditEntry::new(operation, start_time, elapsed, query, response_code);
        if let Err(e) = audit.add(entry) {
            error!("Failed to record audit entry: {}", e);
        }
    }
}

#[async_trait]
impl QueryExecutor for GraphqlClient {
    fn object_store(&self) -> &str {
        &self.config.object_store
    }

    async fn execute(
        &self,
        operation: Operation,
        query: &str,
        variables: serde_json::Value,
    ) -> std::result::Result<QueryResponse, QueryError> {
        let start_time = Utc::now();
        let started = Instant::now();

        let (result, response_code) = self.send(query, &variables).await;
        let elapsed = started.elapsed();
        debug!(
            "{} completed in {:?} (status: {:?})",
            operation, elapsed, response_code
        );

        self.record(operation, start_time, elapsed, query, response_code);
        result
    }
}

fn map_transport_error(e: &reqwest::Error) -> QueryError {
    if e.is_timeout() {
        QueryError::Timeout
    } else {
        QueryError::Transport(e.to_string())
    }
}

/// Parse a GraphQL response body
fn parse_response(body: &str) -> std::result::Result<QueryResponse, QueryError> {
    serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repometa_audit::AuditPolicy;
    use serde_json::json;

    fn config(server_url: &str) -> ClientConfig {
        ClientConfig {
            server_url: server_url.to_string(),
            object_store: "OS1".to_string(),
            timeout_ms: 2_000,
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_request_body() {
        let variables = json!({"object_store_name": "OS1", "page_size": 500});
        let body = serde_json::to_value(GraphqlRequest {
            query: "query { x }",
            variables: &variables,
        })
        .unwrap();
        assert_eq!(body["query"], "query { x }");
        assert_eq!(body["variables"]["page_size"], 500);
    }

    #[test]
    fn test_parse_response() {
        let response =
            parse_response(r#"{"data": {"classDescription": null}, "errors": [{"message": "nope"}]}"#)
                .unwrap();
        assert_eq!(response.error_message(), "nope");

        let err = parse_response("<html>gateway error</html>").unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[test]
    fn test_object_store() {
        let client = GraphqlClient::new(config("https://cpe.example.com/graphql")).unwrap();
        assert_eq!(client.object_store(), "OS1");
        assert_eq!(client.server_url(), "https://cpe.example.com/graphql");
        assert!(client.audit().is_none());
    }

    #[test]
    fn test_record_appends_entry() {
        let audit = Arc::new(AuditLogger::new(10, None, AuditPolicy::Batch));
        let client = GraphqlClient::new(config("https://cpe.example.com/graphql"))
            .unwrap()
            .with_audit(Arc::clone(&audit));

        client.record(
            Operation::MetadataQuery,
            Utc::now(),
            Duration::from_millis(42),
            "query { x }",
            Some(200),
        );

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation(), Operation::MetadataQuery);
        assert_eq!(entries[0].response_code(), Some(200));
        assert_eq!(entries[0].query(), "query { x }");
    }

    #[test]
    fn test_record_swallows_audit_failure() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLogger::new(
            10,
            Some(dir.path().to_path_buf()),
            AuditPolicy::WriteOnAdd,
        ));
        let client = GraphqlClient::new(config("https://cpe.example.com/graphql"))
            .unwrap()
            .with_audit(Arc::clone(&audit));

        client.record(
            Operation::UtilQueryAll,
            Utc::now(),
            Duration::ZERO,
            "query { x }",
            None,
        );

        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_audited() {
        let audit = Arc::new(AuditLogger::new(10, None, AuditPolicy::Batch));
        // Nothing listens on port 1
        let client = GraphqlClient::new(config("http://127.0.0.1:1/graphql"))
            .unwrap()
            .with_audit(Arc::clone(&audit));

        let result = client
            .execute(Operation::DiscoveryQuery, "query { x }", json!({}))
            .await;

        assert!(result.is_err());
        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation(), Operation::DiscoveryQuery);
        assert_eq!(entries[0].response_code(), None);
    }
}
