//! Infrastructure Layer - HyperDrive Orchestration Core
//!
//! Configuration loading (defaults, TOML file, environment variables) and
//! the logging bootstrap. Nothing here is reachable from the request hot
//! path; the engines receive their tuning once at construction.

pub mod config;
pub mod constants;
pub mod logging;

pub use config::{AppConfig, ConfigLoader};
