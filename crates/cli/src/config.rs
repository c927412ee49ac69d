//! Optional settings file (vapi-mcp.toml).
//!
//! Credentials never live here; they come from the environment. The file
//! only tunes the endpoint and the voice assistant.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use vapi::AssistantConfig;

/// Top-level settings file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Endpoint settings.
    #[serde(default)]
    pub vapi: VapiSettings,

    /// Assistant overrides; unset fields keep their defaults.
    #[serde(default)]
    pub assistant: Option<AssistantConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VapiSettings {
    /// API base URL, e.g. a staging or mock server.
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse settings from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if settings.vapi.timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(settings)
    }

    /// Layer these settings over the environment-derived configuration.
    pub fn apply(self, mut config: vapi::Config) -> vapi::Config {
        if let Some(url) = self.vapi.base_url {
            config = config.with_base_url(url);
        }
        if let Some(secs) = self.vapi.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(assistant) = self.assistant {
            config = config.with_assistant(assistant);
        }
        config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("vapi.timeout_secs must be greater than zero")]
    ZeroTimeout,
}
