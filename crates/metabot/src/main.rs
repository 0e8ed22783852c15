//! Metabot binary.
//!
//! ```text
//! metabot [--config PATH] [SERVER[:PORT]] [CHANNEL] [NICKNAME]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

use metabot::{bot, telemetry, Config};

/// Chat bot that summarizes video and image links
#[derive(Parser)]
#[command(name = "metabot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server to connect to, as HOST or HOST:PORT
    server: Option<String>,

    /// Channel to join, e.g. #links
    channel: Option<String>,

    /// Nickname to use
    nickname: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init().context("failed to initialize logging")?;

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(
        cli.server.as_deref(),
        cli.channel.as_deref(),
        cli.nickname.as_deref(),
    )?;

    bot::run(config, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
