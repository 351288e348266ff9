//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via AIRTOUCH_CONFIG)
//! 3. Environment variables

use crate::connection::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Controller address and socket settings.
    pub controller: ControllerConfig,
    /// Status polling schedule.
    pub polling: PollingConfig,
    /// Reconnect behaviour.
    pub reconnect: ReconnectConfig,
    /// Status event delivery.
    pub events: EventsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("AIRTOUCH_CONFIG") {
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

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from a variable lookup. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.controller.apply_overrides(&lookup);
        self.polling.apply_overrides(&lookup);
        self.reconnect.apply_overrides(&lookup);
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "controller host not set".to_string(),
            ));
        }
        if self.controller.port == 0 {
            return Err(ConfigError::ValidationError(
                "controller port must be non-zero".to_string(),
            ));
        }
        if self.polling.group_poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "group poll interval must be non-zero".to_string(),
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "event channel capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Builds the connection settings for this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.controller.host.clone())
            .with_port(self.controller.port)
            .with_connect_timeout(self.controller.connect_timeout())
            .with_read_buffer_size(self.controller.read_buffer_size)
            .with_group_poll_delay(self.polling.group_poll_delay())
            .with_group_poll_interval(self.polling.group_poll_interval())
            .with_reconnect_cooldown(self.reconnect.cooldown())
            .with_event_capacity(self.events.channel_capacity)
    }
}

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Controller hostname or IP address.
    pub host: String,
    /// Controller TCP port.
    pub port: u16,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Socket read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: airtouch_protocol::DEFAULT_PORT,
            connect_timeout_secs: 10,
            read_buffer_size: 1024,
        }
    }
}

impl ControllerConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("AIRTOUCH_HOST") {
            self.host = host;
        }

        if let Some(port) = lookup("AIRTOUCH_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }

        if let Some(timeout) = lookup("AIRTOUCH_CONNECT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }
    }

    /// Returns connect timeout as Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between the AC poll and the first group poll, in milliseconds.
    pub group_poll_delay_ms: u64,
    /// Period of the recurring group poll, in seconds.
    pub group_poll_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            group_poll_delay_ms: 2_000,
            group_poll_interval_secs: 285,
        }
    }
}

impl PollingConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(interval) = lookup("AIRTOUCH_GROUP_POLL_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.group_poll_interval_secs = secs;
            }
        }
    }

    pub fn group_poll_delay(&self) -> Duration {
        Duration::from_millis(self.group_poll_delay_ms)
    }

    pub fn group_poll_interval(&self) -> Duration {
        Duration::from_secs(self.group_poll_interval_secs)
    }
}

/// Reconnect configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Wait before each reconnect attempt, in seconds.
    pub cooldown_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { cooldown_secs: 10 }
    }
}

impl ReconnectConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(cooldown) = lookup("AIRTOUCH_RECONNECT_COOLDOWN") {
            if let Ok(secs) = cooldown.parse() {
                self.cooldown_secs = secs;
            }
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Event delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Status events buffered per subscriber before the slowest one lags.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}
