//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events. Binaries and test harnesses
//! call [`init_tracing`] once to install a subscriber.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::TesseraResult;
use serde::{Deserialize, Serialize};

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether a subscriber is installed at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Service name attached to the startup event.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Filter directives used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,

    /// Whether to enable console output.
    #[serde(default = "default_console_output")]
    pub console_output: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_service_name() -> String {
    "tessera".to_string()
}

fn default_log_level() -> String {
    "info,tessera=debug".to_string()
}

fn default_console_output() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            service_name: default_service_name(),
            log_level: default_log_level(),
            json: false,
            console_output: default_console_output(),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides `log_level`. Fails if a global subscriber is
/// already set.
#[cfg(feature = "telemetry")]
pub fn init_tracing(config: &TelemetryConfig) -> TesseraResult<()> {
    if !config.enabled || !config.console_output {
        return Ok(());
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    result.map_err(|e| {
        crate::TesseraError::Internal(format!("Failed to install tracing subscriber: {}", e))
    })?;

    tracing::info!(
        service_name = %config.service_name,
        json = config.json,
        "Tracing initialized"
    );

    Ok(())
}

/// Placeholder for when telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_config: &TelemetryConfig) -> TesseraResult<()> {
    Ok(())
}
