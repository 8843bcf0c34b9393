// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP listeners that fan live audio and telemetry out to clients.

use std::net::SocketAddr;

use tokio::io::BufWriter;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use rx_core::stream::{
    encode_pcm_s16le, encode_telemetry, write_msg, AudioStreamInfo, MSG_AUDIO_FRAME,
    MSG_STREAM_INFO, MSG_TELEMETRY,
};
use rx_core::{TelemetryBus, TelemetryMessage};
use rx_pipeline::ChannelSink;

/// Serve 16-bit PCM audio: a stream-info message, then one frame per
/// block leaving the AF gain stage.
pub async fn run_audio_listener(
    listener: TcpListener,
    audio: ChannelSink,
    stream_info: AudioStreamInfo,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    info!("Audio listener on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Audio client connected: {}", peer);
                let audio_rx = audio.subscribe();
                let info = stream_info.clone();
                let client_shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_audio_client(socket, peer, audio_rx, info, client_shutdown_rx).await {
                        warn!("Audio client {} error: {:?}", peer, e);
                    }
                    info!("Audio client {} disconnected", peer);
                });
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Audio listener shutting down");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => break,
                }
            }
        }
    }
    Ok(())
}

async fn handle_audio_client(
    socket: TcpStream,
    peer: SocketAddr,
    mut audio_rx: broadcast::Receiver<Vec<f32>>,
    stream_info: AudioStreamInfo,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(socket);
    let info_json = serde_json::to_vec(&stream_info).map_err(std::io::Error::other)?;
    write_msg(&mut writer, MSG_STREAM_INFO, &info_json).await?;

    loop {
        tokio::select! {
            result = audio_rx.recv() => {
                match result {
                    Ok(frame) => {
                        write_msg(&mut writer, MSG_AUDIO_FRAME, &encode_pcm_s16le(&frame)).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Audio: {} dropped {} frames", peer, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Serve every telemetry bus message as a `[topic, meta, payload]` frame.
pub async fn run_telemetry_listener(
    listener: TcpListener,
    bus: TelemetryBus,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    info!("Telemetry listener on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Telemetry client connected: {}", peer);
                let bus_rx = bus.subscribe();
                let client_shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_telemetry_client(socket, peer, bus_rx, client_shutdown_rx).await {
                        warn!("Telemetry client {} error: {:?}", peer, e);
                    }
                    info!("Telemetry client {} disconnected", peer);
                });
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Telemetry listener shutting down");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => break,
                }
            }
        }
    }
    Ok(())
}

async fn handle_telemetry_client(
    socket: TcpStream,
    peer: SocketAddr,
    mut bus_rx: broadcast::Receiver<TelemetryMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(socket);
    loop {
        tokio::select! {
            result = bus_rx.recv() => {
                match result {
                    Ok(msg) => {
                        write_msg(&mut writer, MSG_TELEMETRY, &encode_telemetry(&msg)).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Telemetry: {} dropped {} messages", peer, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}
