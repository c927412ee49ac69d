//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Startup and serving errors. Any of these ends the process with exit code 1.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The settings file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A `.env` file exists but could not be read or parsed.
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// Credentials are missing or the HTTP client could not be built.
    #[error(transparent)]
    Vapi(#[from] vapi::Error),

    /// The MCP transport failed.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
