//! Smart Alarm Server - Main Entry Point

use anyhow::Context;
use api::config::AppConfig;
use api::{init_logging, run};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Smart wake alarm: sleep stage tracking over MQTT
#[derive(Debug, Parser)]
#[command(name = "smart-alarm", version, about)]
struct Cli {
    /// TOML configuration file (optional; `SMART_ALARM__*` variables override it)
    #[arg(short, long, default_value = "smart-alarm.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    info!("=== Smart Alarm v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "MQTT broker {}:{}, window of {} samples",
        config.mqtt.host, config.mqtt.port, config.tracking.window_size
    );

    run(config).await
}
