//! Configuration loader with layered sources.

use crate::{describe_issues, ConfigValidator, TesseraConfig};
use config::{Config, ConfigError, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::TesseraError;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<TesseraConfig>>,
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `{dir}/default.toml` - Default values
    /// 2. `{dir}/{environment}.toml` - Environment-specific overrides
    /// 3. `{dir}/local.toml` - Local overrides
    /// 4. Environment variables with `TESSERA__` prefix
    ///    (e.g. `TESSERA__DATABASE__URL`)
    ///
    /// The environment name comes from `TESSERA_ENVIRONMENT` and defaults to
    /// `development`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Result<Self, TesseraError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, TesseraError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> TesseraConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    ///
    /// The previous configuration stays in place if the new one is invalid.
    pub async fn reload(&self) -> Result<(), TesseraError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &Path) -> Result<TesseraConfig, TesseraError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("TESSERA_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!(
            "Loading configuration for environment: {} from {}",
            environment,
            config_dir.display()
        );

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = config_dir.join(format!("{name}.toml"));
            if path.exists() {
                debug!("Loading config layer from: {}", path.display());
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TESSERA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_tessera_error)?;

        let tessera_config: TesseraConfig = config
            .try_deserialize()
            .map_err(config_error_to_tessera_error)?;

        ConfigValidator::validate(&tessera_config)
            .map_err(|issues| TesseraError::Configuration(describe_issues(&issues)))?;

        Ok(tessera_config)
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_tessera_error(err: ConfigError) -> TesseraError {
    TesseraError::Configuration(err.to_string())
}
