use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use winterready::config::AppConfig;
use winterready::{VERSION, telemetry, web};

/// Winter travel risk service for Northern Norway
#[derive(Parser, Debug)]
#[command(name = "winterready")]
#[command(about = "Aggregates weather, avalanche, road, ocean and aurora feeds into a safety verdict", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config dir, then ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level regardless of configuration
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_path(cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    telemetry::init(&config.logging)?;
    info!(
        version = VERSION,
        environment = ?config.server.environment,
        "Starting WinterReady"
    );

    web::run(&config).await
}
