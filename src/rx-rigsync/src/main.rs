// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod client;
mod config;
mod endpoint;
mod lnb;
mod sync;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use rx_app::{init_logging, ConfigFile};

use config::RigSyncConfig;

type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const PKG_DESCRIPTION: &str = concat!(
    env!("CARGO_PKG_NAME"),
    " - keeps a receiver panadapter on a rig's dial frequency"
);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// rigctl server address (host[:port])
    #[arg(short = 'r', long = "rig", value_name = "ADDR")]
    rig: Option<String>,
    /// Receiver remote-control address (host[:port])
    #[arg(short = 'g', long = "remote", value_name = "ADDR")]
    remote: Option<String>,
    /// Rig IF the receiver is parked on, in Hz
    #[arg(short = 'f', long = "if-freq", value_name = "HZ")]
    if_freq: Option<u64>,
    /// Poll interval in milliseconds
    #[arg(short = 'i', long = "interval-ms", value_name = "MS")]
    interval_ms: Option<u64>,
    /// Log level override (trace, debug, info, warn, error)
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply_to(&self, cfg: &mut RigSyncConfig) {
        if let Some(ref rig) = self.rig {
            cfg.sync.rig = rig.clone();
        }
        if let Some(ref remote) = self.remote {
            cfg.sync.remote = remote.clone();
        }
        if let Some(hz) = self.if_freq {
            cfg.sync.if_freq_hz = hz;
        }
        if let Some(ms) = self.interval_ms {
            cfg.sync.interval_ms = ms;
        }
        if self.log_level.is_some() {
            cfg.general.log_level = self.log_level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", RigSyncConfig::example_combined_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = RigSyncConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid rigsync configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());
    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let settings = cfg.settings()?;
    info!(
        "Starting rx-rigsync (rig: {}, receiver: {}, IF: {} Hz)",
        settings.rig, settings.remote, settings.if_freq_hz
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(sync::run_sync(settings, shutdown_rx));

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
        info!("Sync task did not stop in time");
    }
    Ok(())
}
