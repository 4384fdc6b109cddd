//! Configuration structures.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessera_core::{KeyPolicy, KeyStrategy, TelemetryConfig};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseraConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// DAO key discovery and insert policy.
    #[serde(default)]
    pub dao: DaoSettings,

    /// Tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL.
    pub url: String,
    /// Minimum connection pool size.
    pub min_connections: u32,
    /// Maximum connection pool size.
    pub max_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Enable SQL query logging.
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 5,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            log_queries: false,
        }
    }
}

impl DatabaseConfig {
    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the idle timeout as a Duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Returns true for in-memory SQLite URLs.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite:") && self.url.contains(":memory:")
    }
}

/// Settings shared by every DAO built from this configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaoSettings {
    /// How key fields are discovered.
    pub key_strategy: KeyStrategy,
    /// Insert policy. When unset, the backend's key metadata decides:
    /// generated primary keys use [`KeyPolicy::Generated`].
    pub key_policy: Option<KeyPolicy>,
}
