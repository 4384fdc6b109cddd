//! Checks a loaded configuration before anything connects.
//!
//! Every problem is collected so a bad deployment fails once with a
//! complete report.

use crate::{DatabaseConfig, TesseraConfig};
use std::fmt;
use tessera_core::TelemetryConfig;
use url::Url;

/// A single problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// The database URL does not name a SQLite database.
    UnsupportedDatabase { url: String },
    /// A `sqlite://` URL that does not parse.
    MalformedDatabaseUrl { url: String, reason: String },
    /// Pool bounds are empty or inverted.
    ConnectionBounds { min: u32, max: u32 },
    /// A timeout that must be positive is zero.
    ZeroTimeout { setting: &'static str },
    /// A tracing filter directive names an unknown level.
    LogFilter { directive: String },
    EmptyServiceName,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDatabase { url } if url.is_empty() => {
                f.write_str("database.url is empty")
            }
            Self::UnsupportedDatabase { url } => {
                write!(f, "database.url '{url}' is not a sqlite: URL")
            }
            Self::MalformedDatabaseUrl { url, reason } => {
                write!(f, "database.url '{url}' does not parse: {reason}")
            }
            Self::ConnectionBounds { min, max } => write!(
                f,
                "database pool bounds min={min} max={max} allow no connections"
            ),
            Self::ZeroTimeout { setting } => write!(f, "{setting} must be greater than zero"),
            Self::LogFilter { directive } => write!(
                f,
                "telemetry.log_level directive '{directive}' names no level \
                 (trace, debug, info, warn, error, off)"
            ),
            Self::EmptyServiceName => f.write_str("telemetry.service_name is empty"),
        }
    }
}

impl std::error::Error for ConfigIssue {}

/// Validates a [`TesseraConfig`].
pub struct ConfigValidator;

impl ConfigValidator {
    const LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error", "off"];

    /// Returns every issue found, or `Ok(())` for a usable configuration.
    pub fn validate(config: &TesseraConfig) -> Result<(), Vec<ConfigIssue>> {
        let mut issues = Vec::new();
        Self::check_database(&config.database, &mut issues);
        Self::check_telemetry(&config.telemetry, &mut issues);

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    fn check_database(config: &DatabaseConfig, issues: &mut Vec<ConfigIssue>) {
        if !config.url.starts_with("sqlite:") {
            issues.push(ConfigIssue::UnsupportedDatabase {
                url: config.url.clone(),
            });
        } else if config.url.starts_with("sqlite://") {
            // sqlite::memory: and sqlite:relative.db are accepted without parsing
            if let Err(e) = Url::parse(&config.url) {
                issues.push(ConfigIssue::MalformedDatabaseUrl {
                    url: config.url.clone(),
                    reason: e.to_string(),
                });
            }
        }

        // In-memory pools are pinned to one connection when opened.
        if !config.is_in_memory()
            && (config.max_connections == 0 || config.min_connections > config.max_connections)
        {
            issues.push(ConfigIssue::ConnectionBounds {
                min: config.min_connections,
                max: config.max_connections,
            });
        }

        for (setting, secs) in [
            ("database.connect_timeout_secs", config.connect_timeout_secs),
            ("database.idle_timeout_secs", config.idle_timeout_secs),
        ] {
            if secs == 0 {
                issues.push(ConfigIssue::ZeroTimeout { setting });
            }
        }
    }

    fn check_telemetry(config: &TelemetryConfig, issues: &mut Vec<ConfigIssue>) {
        if config.service_name.trim().is_empty() {
            issues.push(ConfigIssue::EmptyServiceName);
        }

        // `info` or `tessera=debug`, comma separated
        for directive in config.log_level.split(',') {
            let level = directive.rsplit('=').next().unwrap_or_default();
            if !Self::LEVELS.contains(&level.trim().to_lowercase().as_str()) {
                issues.push(ConfigIssue::LogFilter {
                    directive: directive.trim().to_string(),
                });
            }
        }
    }
}

/// Renders issues as a numbered report.
#[must_use]
pub fn describe_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .enumerate()
        .fold(String::from("invalid configuration:"), |mut report, (i, issue)| {
            report.push_str(&format!("\n  {}. {issue}", i + 1));
            report
        })
}
