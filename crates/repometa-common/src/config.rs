//! Configuration types for RepoMeta
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `REPOMETA_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `REPOMETA_CLIENT__SERVER_URL`).

use crate::error::{Error, Result};
use crate::types::NamePropertyIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Root configuration for RepoMeta
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote query service connection
    pub client: ClientConfig,
    /// Audit log configuration
    pub audit: AuditConfig,
    /// Metadata loading configuration
    pub metadata: MetadataConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("REPOMETA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check that the settings required to reach the repository are present
    pub fn validate(&self) -> Result<()> {
        if self.client.server_url.trim().is_empty() {
            return Err(Error::configuration("server_url is required"));
        }
        if self.client.object_store.trim().is_empty() {
            return Err(Error::configuration("object_store is required"));
        }
        Ok(())
    }
}

/// Connection settings for the remote query service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// GraphQL endpoint URL
    pub server_url: String,
    /// Object store (repository) identifier
    pub object_store: String,
    /// Basic auth user name
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Verify TLS certificates
    pub ssl_enabled: bool,
    /// Request timeout (milliseconds)
    pub timeout_ms: u64,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            object_store: String::new(),
            username: None,
            password: None,
            ssl_enabled: true,
            timeout_ms: 30_000,
            pool_max_idle_per_host: 100,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("object_store", &self.object_store)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ssl_enabled", &self.ssl_enabled)
            .field("timeout_ms", &self.timeout_ms)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .finish()
    }
}

/// Audit log configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum entries kept in memory
    pub max_entries: usize,
    /// Destination file (entries are appended, never truncated)
    pub file_path: Option<PathBuf>,
    /// Write every entry as it is added instead of in batches
    pub write_on_add: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            file_path: None,
            write_on_add: false,
        }
    }
}

/// Metadata loading configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Maximum subclasses fetched per root-class discovery
    pub subclass_page_size: u32,
    /// Interpretation of a reported name-property index of zero
    pub name_property_index: NamePropertyIndex,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            subclass_page_size: 500,
            name_property_index: NamePropertyIndex::default(),
        }
    }
}
