//! Configuration management.
//!
//! Configuration merges three sources, later ones winning:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables with the `RELSYNC_` prefix and `__` as the
//!    nested-key separator, e.g. `RELSYNC_STORE__API_URL`

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// Message bus settings
    #[serde(default)]
    pub bus: BusSettings,

    /// Relationship store settings
    #[serde(default)]
    pub store: StoreSettings,

    /// Check service settings
    #[serde(default)]
    pub check: CheckSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Message bus connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BusSettings {
    /// Bus server URL
    #[serde(default = "default_bus_url")]
    pub url: String,

    /// Queue group name for load-balanced subscriptions
    #[serde(default = "default_queue")]
    pub queue: String,

    /// KV bucket holding cache entries and the invalidation marker
    #[serde(default = "default_cache_bucket")]
    pub cache_bucket: String,

    /// Maximum events processed concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            queue: default_queue(),
            cache_bucket: default_cache_bucket(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_bus_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_queue() -> String {
    "lfx.fga-sync.queue".to_string()
}

fn default_cache_bucket() -> String {
    "fga-sync-cache".to_string()
}

fn default_max_in_flight() -> usize {
    64
}

/// Relationship store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StoreSettings {
    /// Store API base URL
    #[serde(default = "default_store_api_url")]
    pub api_url: String,

    /// Store identifier (required)
    #[serde(default)]
    pub store_id: String,

    /// Pinned authorization model; latest when unset
    pub authorization_model_id: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            api_url: default_store_api_url(),
            store_id: String::new(),
            authorization_model_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_store_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Check service settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CheckSettings {
    /// Maximum check requests served concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MetricsSettings {
    /// Enable the metrics/health listener
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address for the metrics/health endpoints
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_metrics_listen(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_metrics_listen() -> String {
    "0.0.0.0:9090".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServiceConfig {
    /// Loads configuration from a YAML file with environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix("RELSYNC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;

        Ok(service_config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?)
            .add_source(
                Environment::with_prefix("RELSYNC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;

        Ok(service_config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.store.store_id.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "store.store_id is required".to_string(),
            });
        }

        if self.bus.url.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "bus.url must not be empty".to_string(),
            });
        }

        if self.bus.max_in_flight == 0 || self.check.max_in_flight == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "max_in_flight must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}
