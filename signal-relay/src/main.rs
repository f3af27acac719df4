//! signal-relay binary entry point.
//!
//! Usage:
//! ```bash
//! signal-relay --config relay.toml
//! PORT=8080 signal-relay
//! signal-relay --help
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use signal_relay::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Topic-based signaling relay with single-page-app hosting.
#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration file
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("signal-relay v{}", env!("CARGO_PKG_VERSION"));
    signal_relay::run(config)
        .await
        .context("Relay terminated with an error")?;

    Ok(())
}
