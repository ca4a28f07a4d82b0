//! Blitz auto-trading bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Signal-driven brokerage auto-trader with martingale money management.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BLITZ_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    blitz_broker::init_crypto();

    let args = Args::parse();

    blitz_telemetry::init_logging()?;

    info!("Starting blitz-bot v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > BLITZ_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("BLITZ_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = blitz_bot::AppConfig::from_file(&config_path)?;
    info!(
        ws_url = %config.ws_url,
        accounts = config.accounts.len(),
        "Configuration loaded"
    );

    let app = blitz_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
