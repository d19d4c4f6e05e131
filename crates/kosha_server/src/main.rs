//! The kosha server binary.
//!

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use kosha_server::{build_router, serve::serve, AppConfig, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A linked-data resource server.
#[derive(Debug, Parser)]
#[command(name = "kosha", version, about)]
struct Cli {
    /// Path of the configuration directory holding
    /// `config.yaml`.
    #[arg(short = 'c', long = "conf", default_value = "./configs")]
    conf: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.conf)?;
    info!("Loaded configuration from {:?}.", cli.conf);

    let state = AppState::init(&config).await?;
    let app = build_router(state, Duration::from_secs(config.server.http.timeout));

    serve(&config, app).await
}
