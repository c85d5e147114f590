//! HyperDrive control-plane binary
//!
//! Loads configuration, initializes logging, constructs an orchestrator
//! over an initially empty provider registry, starts the background loops,
//! and serves the JSON control plane. Provider executors are registered by
//! embedding code or over the library API; the binary itself is the
//! control and observability surface.

use clap::Parser;
use hyperdrive_core::{Orchestrator, ProviderRegistry};
use hyperdrive_infrastructure::config::ConfigLoader;
use hyperdrive_infrastructure::logging::init_logging;
use hyperdrive_server::{build_rocket, ApiState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// HyperDrive orchestration control plane
#[derive(Parser, Debug)]
#[command(name = "hyperdrive", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let mut config = loader.load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)?;

    let registry = Arc::new(ProviderRegistry::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        config.engine.clone(),
    )?);
    let _background = orchestrator.spawn_background_loops();

    info!(
        "Starting HyperDrive control plane on {}:{}",
        config.server.host, config.server.port
    );

    let figment = rocket::Config::figment()
        .merge(("address", config.server.host.clone()))
        .merge(("port", config.server.port));

    let _rocket = build_rocket(ApiState::new(orchestrator), figment)
        .launch()
        .await?;

    Ok(())
}
