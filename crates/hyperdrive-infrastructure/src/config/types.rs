//! Configuration types
//!
//! One struct per section; defaults come from the infrastructure constants
//! and the component-local defaults in `hyperdrive-core`.

use crate::constants::*;
use hyperdrive_core::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Emit JSON-structured log lines
    pub json_format: bool,

    /// Optional file output with daily rotation
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json_format: false,
            file_output: None,
        }
    }
}

/// The full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server section
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging section
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Engine tuning section
    #[serde(default)]
    pub engine: EngineConfig,
}
