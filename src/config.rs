//! Session configuration loaded from TOML.

use crate::opponent::AgentMode;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Settings for one playing session.
///
/// Every field is optional in the TOML file:
///
/// ```toml
/// ice_servers = ["stun:stun.l.google.com:19302"]
/// channel_label = "channel"
/// agent_mode = { searchBudget = 500 }
/// gathering_timeout_secs = 30
/// open_timeout_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct SessionConfig {
    /// STUN/TURN server URLs used for candidate gathering.
    #[serde(default = "default_ice_servers")]
    ice_servers: Vec<String>,

    /// Label of the negotiated data channel.
    #[serde(default = "default_channel_label")]
    #[setters(into)]
    channel_label: String,

    /// Search mode for a local compute agent.
    #[serde(default)]
    agent_mode: AgentMode,

    /// Upper bound on waiting for candidate gathering to finish.
    #[serde(default = "default_gathering_timeout_secs")]
    gathering_timeout_secs: u64,

    /// Upper bound on waiting for the data channel to open.
    #[serde(default = "default_open_timeout_secs")]
    open_timeout_secs: u64,
}

#[instrument]
fn default_ice_servers() -> Vec<String> {
    ["", "1", "2", "3", "4"]
        .iter()
        .map(|n| format!("stun:stun{}.l.google.com:19302", n))
        .collect()
}

#[instrument]
fn default_channel_label() -> String {
    "channel".to_string()
}

#[instrument]
fn default_gathering_timeout_secs() -> u64 {
    30
}

#[instrument]
fn default_open_timeout_secs() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            channel_label: default_channel_label(),
            agent_mode: AgentMode::default(),
            gathering_timeout_secs: default_gathering_timeout_secs(),
            open_timeout_secs: default_open_timeout_secs(),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(
            ice_servers = config.ice_servers.len(),
            label = %config.channel_label,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Candidate gathering bound as a duration.
    pub fn gathering_timeout(&self) -> Duration {
        Duration::from_secs(self.gathering_timeout_secs)
    }

    /// Channel open bound as a duration.
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
