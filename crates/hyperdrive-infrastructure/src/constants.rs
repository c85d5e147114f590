//! Infrastructure constants
//!
//! Default values for the configuration surface. Engine tuning defaults
//! live with their components in `hyperdrive-core`.

/// Environment variable prefix for configuration overrides
pub const CONFIG_ENV_PREFIX: &str = "HYPERDRIVE";

/// Default configuration file name searched in the working directory
pub const DEFAULT_CONFIG_FILENAME: &str = "hyperdrive.toml";

/// Default configuration directory under the working directory
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Default HTTP bind address
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default HTTP port
pub const DEFAULT_SERVER_PORT: u16 = 8700;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
