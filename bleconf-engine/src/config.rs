//! Engine configuration.
//!
//! Configuration is loaded in the following order (later overrides
//! earlier):
//! 1. Default values
//! 2. YAML config file (if specified via BLECONF_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport limits and pacing.
    pub transport: TransportConfig,
    /// Periodic push behavior.
    pub push: PushConfig,
    /// Settings persistence.
    pub store: StoreConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BLECONF_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.transport.apply_env_overrides();
        self.push.apply_env_overrides();
        self.store.apply_env_overrides();
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "transport.chunk_size must be at least 1".to_string(),
            ));
        }
        // Smallest possible frame: length(2) + cmd(1) + crc(2).
        if self.transport.max_frame_size < 5 {
            return Err(ConfigError::ValidationError(
                "transport.max_frame_size must be at least 5".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transport limits and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum bytes per outbound write.
    pub chunk_size: usize,
    /// Pacing delay between consecutive chunks in milliseconds.
    pub chunk_delay_ms: u64,
    /// Upper bound on the reassembly buffer.
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: bleconf_protocol::DEFAULT_CHUNK_SIZE,
            chunk_delay_ms: 20,
            max_frame_size: bleconf_protocol::MAX_FRAME_SIZE,
        }
    }
}

impl TransportConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("BLECONF_CHUNK_SIZE") {
            if let Ok(n) = size.parse() {
                self.chunk_size = n;
            }
        }
        if let Ok(delay) = std::env::var("BLECONF_CHUNK_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.chunk_delay_ms = ms;
            }
        }
        if let Ok(max) = std::env::var("BLECONF_MAX_FRAME_SIZE") {
            if let Ok(n) = max.parse() {
                self.max_frame_size = n;
            }
        }
    }

    /// Returns the chunk pacing delay as a Duration.
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

/// Periodic push behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Interval between access-point push frames in seconds.
    pub ap_interval_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            ap_interval_secs: 5,
        }
    }
}

impl PushConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(interval) = std::env::var("BLECONF_AP_PUSH_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.ap_interval_secs = secs;
            }
        }
    }

    /// Returns the push interval as a Duration.
    pub fn ap_interval(&self) -> Duration {
        Duration::from_secs(self.ap_interval_secs)
    }
}

/// Settings persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON settings file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./bleconf-settings.json"),
        }
    }
}

impl StoreConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BLECONF_STORE") {
            self.path = PathBuf::from(path);
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
