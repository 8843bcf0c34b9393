// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod rx_task;
mod stream;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use rx_app::{init_logging, ConfigFile};
use rx_core::stream::AudioStreamInfo;
use rx_core::{DynResult, RxRequest, RxSnapshot, TelemetryBus};
use rx_pipeline::{ChannelSink, SyntheticSource};
use rx_remote::spawn_remote;

use config::ServerConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - SDR receiver daemon");
const RX_TASK_CHANNEL_BUFFER: usize = 32;
const METER_INTERVAL: Duration = Duration::from_millis(250);

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
    /// Log level override (trace, debug, info, warn, error)
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    if cli.log_level.is_some() {
        cfg.general.log_level = cli.log_level.clone();
    }
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }
    debug!("Effective configuration: {}", serde_json::to_string(&cfg)?);

    let freq_range = cfg.freq_range();
    let gain_range = cfg.gain_range();
    info!(
        "Starting rx-server (device: {}, {}..{} Hz, {} S/s)",
        cfg.device.kind, freq_range.min_hz, freq_range.max_hz, cfg.device.sample_rate
    );

    let source = SyntheticSource::new(freq_range, gain_range, cfg.device.sample_rate)
        .with_tones(cfg.tones())
        .with_noise(cfg.device.noise);
    let sink = ChannelSink::new(cfg.audio.channel_capacity);
    let telemetry = cfg
        .telemetry
        .enabled
        .then(|| TelemetryBus::new(cfg.telemetry.capacity));

    let initial_state = RxSnapshot::new(
        freq_range,
        gain_range,
        cfg.device.sample_rate,
        cfg.audio.sample_rate,
    )?;
    let (tx, rx) = mpsc::channel::<RxRequest>(RX_TASK_CHANNEL_BUFFER);
    let (state_tx, state_rx) = watch::channel(initial_state);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();

    if let Some(addr) = cfg.audio_listen_addr() {
        let listener = TcpListener::bind(addr).await?;
        let info = AudioStreamInfo::pcm_s16le(cfg.audio.sample_rate);
        let audio = sink.clone();
        let audio_shutdown_rx = shutdown_rx.clone();
        task_handles.push(tokio::spawn(async move {
            if let Err(e) =
                stream::run_audio_listener(listener, audio, info, audio_shutdown_rx).await
            {
                error!("Audio listener error: {:?}", e);
            }
        }));
    }

    if let (Some(addr), Some(bus)) = (cfg.telemetry_listen_addr(), telemetry.clone()) {
        let listener = TcpListener::bind(addr).await?;
        let telemetry_shutdown_rx = shutdown_rx.clone();
        task_handles.push(tokio::spawn(async move {
            if let Err(e) = stream::run_telemetry_listener(listener, bus, telemetry_shutdown_rx).await
            {
                error!("Telemetry listener error: {:?}", e);
            }
        }));
    }

    let task_config = rx_task::RxTaskConfig {
        source: Box::new(source),
        sink: Box::new(sink),
        receiver: cfg.receiver_config(),
        telemetry,
        meter_interval: METER_INTERVAL,
    };
    let rx_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) = rx_task::run_rx_task(task_config, rx, state_tx, rx_shutdown_rx).await {
            error!("Rx task error: {:?}", e);
        }
    }));

    if cfg.remote.enabled {
        let settings = cfg.remote_settings();
        info!(
            "Remote control on {} (allowed: {:?})",
            settings.listen, settings.allowed_hosts
        );
        let remote = spawn_remote(settings, state_rx.clone(), tx.clone());
        let remote_abort = remote.abort_handle();
        let remote_shutdown_rx = shutdown_rx.clone();
        task_handles.push(tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_shutdown(remote_shutdown_rx) => remote_abort.abort(),
                res = remote => {
                    if let Err(e) = res {
                        if !e.is_cancelled() {
                            error!("Remote control task failed: {:?}", e);
                        }
                    }
                }
            }
        }));
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    drop(tx);
    tokio::time::sleep(Duration::from_millis(400)).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    Ok(())
}
