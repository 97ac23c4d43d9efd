//! SCAR sync server.

use clap::Parser;
use scar::ScarConfig;
use scar::sync::{SyncServer, SyncStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Single-owner sync authority for SCAR collections.
#[derive(Parser)]
#[command(name = "scar-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on. Overrides the `PORT` environment variable and the
    /// config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// JSON document holding the synced collections.
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scar=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    if let Ok(port) = std::env::var("PORT") {
        config.server.port = port.parse()?;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.data_file {
        config.server.data_file = path;
    }

    let store = SyncStore::open(&config.server.data_file, config.server.owner_id.clone());
    info!("serving sync document {}", config.server.data_file.display());
    let server = SyncServer::start(&config.server, store).await?;

    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C, shutting down...");
    server.shutdown();
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ScarConfig> {
    match path {
        Some(path) => Ok(ScarConfig::from_file(path)?),
        None => {
            let default_path = ScarConfig::default_config_path();
            if default_path.exists() {
                Ok(ScarConfig::from_file(&default_path)?)
            } else {
                Ok(ScarConfig::default())
            }
        }
    }
}
