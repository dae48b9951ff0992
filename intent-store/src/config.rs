//! Store configuration
//!
//! Defaults match a production deployment; a JSON file may override any
//! subset of fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for an intent record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the replicated map holding authoritative intent state
    pub current_map_name: String,
    /// Name of the replicated map holding submitted operations
    pub pending_map_name: String,
    /// Gossip settings
    pub gossip: GossipConfig,
    /// Processing chain settings
    pub processing: ProcessingConfig,
    /// Default `tracing` filter for binaries embedding the store
    pub log_filter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            current_map_name: "intent-current".to_string(),
            pending_map_name: "intent-pending".to_string(),
            gossip: GossipConfig::default(),
            processing: ProcessingConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

/// Gossip settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Period of the full anti-entropy push, in milliseconds
    pub anti_entropy_interval_ms: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            anti_entropy_interval_ms: 5_000,
        }
    }
}

impl GossipConfig {
    /// Anti-entropy period
    pub fn anti_entropy_interval(&self) -> Duration {
        Duration::from_millis(self.anti_entropy_interval_ms)
    }
}

/// Processing chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Re-check partition mastership before a chain commits its terminal record
    pub recheck_mastership: bool,
    /// Capacity of the lifecycle event channel
    pub event_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            recheck_mastership: true,
            event_capacity: 1024,
        }
    }
}

impl StoreConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.current_map_name.is_empty() || self.pending_map_name.is_empty() {
            return Err(ConfigError::Invalid("map names must be non-empty".to_string()));
        }
        if self.current_map_name == self.pending_map_name {
            return Err(ConfigError::Invalid(format!(
                "current and pending maps share the name {}",
                self.current_map_name
            )));
        }
        if self.gossip.anti_entropy_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "anti_entropy_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.processing.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both map names
    pub fn map_names(mut self, current: impl Into<String>, pending: impl Into<String>) -> Self {
        self.config.current_map_name = current.into();
        self.config.pending_map_name = pending.into();
        self
    }

    /// Set the anti-entropy period
    pub fn anti_entropy_interval(mut self, interval: Duration) -> Self {
        self.config.gossip.anti_entropy_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enable or disable the mastership re-check before terminal writes
    pub fn recheck_mastership(mut self, enabled: bool) -> Self {
        self.config.processing.recheck_mastership = enabled;
        self
    }

    /// Set the lifecycle event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.processing.event_capacity = capacity;
        self
    }

    /// Set the default log filter
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<StoreConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
