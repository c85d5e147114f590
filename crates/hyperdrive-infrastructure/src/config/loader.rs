//! Configuration loader
//!
//! Handles loading configuration from default values, a TOML file, and
//! prefixed environment variables, merged in that order with figment.

use crate::config::AppConfig;
use crate::constants::*;
use crate::logging::{log_config_loaded, parse_log_level};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use hyperdrive_domain::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader service
#[derive(Clone)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources
    ///
    /// Configuration sources are merged in this order (later sources
    /// override earlier):
    /// 1. Default values from `AppConfig::default()`
    /// 2. TOML configuration file (if it exists)
    /// 3. Environment variables with prefix (e.g. `HYPERDRIVE_SERVER_PORT`)
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if let Some(config_path) = &self.config_path {
            if config_path.exists() {
                figment = figment.merge(Toml::file(config_path));
                log_config_loaded(config_path, true);
            } else {
                log_config_loaded(config_path, false);
            }
        } else if let Some(default_path) = Self::find_default_config_path() {
            if default_path.exists() {
                figment = figment.merge(Toml::file(&default_path));
                log_config_loaded(&default_path, true);
            }
        }

        // Underscore-separated nested keys, e.g. HYPERDRIVE_SERVER_PORT
        figment = figment.merge(Env::prefixed(&format!("{}_", self.env_prefix)).split("_"));

        let app_config: AppConfig = figment
            .extract()
            .map_err(|e| Error::config_with_source("Failed to extract configuration", e))?;

        self.validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, config: &AppConfig, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| Error::config_with_source("Failed to serialize config to TOML", e))?;

        std::fs::write(path.as_ref(), toml_string)?;
        Ok(())
    }

    /// Get the current configuration file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Find the default configuration file to try
    fn find_default_config_path() -> Option<PathBuf> {
        let current_dir = env::current_dir().ok()?;
        let candidates = [
            current_dir.join(DEFAULT_CONFIG_FILENAME),
            current_dir.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME),
        ];
        candidates.into_iter().find(|p| p.exists())
    }

    /// Validate the merged configuration
    fn validate_config(&self, config: &AppConfig) -> Result<()> {
        parse_log_level(&config.logging.level)?;

        if config.server.port == 0 {
            return Err(Error::config("server.port must be non-zero"));
        }
        let alpha = config.engine.metrics.ewma_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::config("engine.metrics.ewma_alpha must be in (0, 1]"));
        }
        if config.engine.orchestrator.max_attempts == 0 {
            return Err(Error::config("engine.orchestrator.max_attempts must be at least 1"));
        }
        if config.engine.orchestrator.dispatch_timeout_ms == 0 {
            return Err(Error::config("engine.orchestrator.dispatch_timeout_ms must be non-zero"));
        }
        if config.engine.failover.probe_success_threshold == 0 {
            return Err(Error::config(
                "engine.failover.probe_success_threshold must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
