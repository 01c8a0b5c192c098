//! Layered configuration: defaults, optional TOML file, environment

use config::{Config, ConfigError, Environment, File};
use gateway::{MqttConfig, RetryPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `SMART_ALARM__MQTT__HOST`
pub const ENV_PREFIX: &str = "SMART_ALARM";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
    pub tracking: TrackingConfig,
    pub connection: ConnectionConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Samples per classified window
    pub window_size: usize,
    /// Nominal seconds between samples
    pub sample_period_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            sample_period_secs: 60,
            poll_interval_secs: 10,
        }
    }
}

impl TrackingConfig {
    pub fn sample_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sample_period_secs as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_secs: 5,
        }
    }
}

impl ConnectionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// JSON manifest describing the ONNX artifact
    pub manifest_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("models/sleep_model.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Csv,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// CSV file for the `csv` backend
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Csv,
            path: PathBuf::from("sleep_windows.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load `path` if it exists, then apply `SMART_ALARM__*` overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracking.window_size == 0 {
            return Err(ConfigError::Message("tracking.window_size must be positive".into()));
        }
        if self.tracking.sample_period_secs == 0 {
            return Err(ConfigError::Message(
                "tracking.sample_period_secs must be positive".into(),
            ));
        }
        if self.tracking.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "tracking.poll_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
