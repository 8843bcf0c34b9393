// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use rx_core::{Freq, RxCommand, RxRequest, RxSnapshot};

use crate::protocol::{
    dump_state, err_only, level_reply, mode_list, mode_reply, ok_only, parse_line, values,
    Level, RemoteCommand,
};

pub const DEFAULT_REMOTE_PORT: u16 = 7356;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub listen: SocketAddr,
    /// Peers allowed to connect; others are dropped on accept.
    pub allowed_hosts: Vec<IpAddr>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_REMOTE_PORT),
            allowed_hosts: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            ],
        }
    }
}

/// Bind and serve in a background task.
pub fn spawn_remote(
    settings: RemoteSettings,
    state_rx: watch::Receiver<RxSnapshot>,
    rx_tx: mpsc::Sender<RxRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(settings.listen).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("remote control bind {} failed: {}", settings.listen, e);
                return;
            }
        };
        info!("remote control listening on {}", settings.listen);
        if let Err(e) = serve(listener, settings.allowed_hosts, state_rx, rx_tx).await {
            error!("remote control server error: {:?}", e);
        }
    })
}

pub async fn serve(
    listener: TcpListener,
    allowed_hosts: Vec<IpAddr>,
    state_rx: watch::Receiver<RxSnapshot>,
    rx_tx: mpsc::Sender<RxRequest>,
) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        if !allowed_hosts.contains(&addr.ip()) {
            warn!("remote connection from {} refused (not in allowed hosts)", addr);
            continue;
        }
        info!("remote client connected: {}", addr);
        let state_rx = state_rx.clone();
        let rx_tx = rx_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, addr, state_rx, rx_tx).await {
                warn!("remote client {} error: {:?}", addr, e);
            }
        });
    }
}

async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    state_rx: watch::Receiver<RxSnapshot>,
    rx_tx: mpsc::Sender<RxRequest>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            debug!("remote client {} disconnected", addr);
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match process_line(trimmed, &state_rx, &rx_tx).await {
            CommandResult::Reply(resp) => writer.write_all(resp.as_bytes()).await?,
            CommandResult::Close => break,
        }
        writer.flush().await?;
    }

    Ok(())
}

enum CommandResult {
    Reply(String),
    Close,
}

async fn process_line(
    line: &str,
    state_rx: &watch::Receiver<RxSnapshot>,
    rx_tx: &mpsc::Sender<RxRequest>,
) -> CommandResult {
    let cmd = match parse_line(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!("remote command rejected: {}", e);
            return CommandResult::Reply(err_only());
        }
    };

    let resp = match cmd {
        RemoteCommand::Quit => return CommandResult::Close,
        RemoteCommand::GetFreq => {
            values([current_snapshot(state_rx).display_freq_hz().to_string()])
        }
        RemoteCommand::SetFreq(hz) => set(rx_tx, RxCommand::Tune(hz)).await,
        RemoteCommand::GetMode => mode_reply(&current_snapshot(state_rx)),
        RemoteCommand::SetMode { mode, passband } => {
            // Reject a bad passband before the mode changes.
            if let Some(width) = passband.filter(|w| !mode.profile().contains_width(*w)) {
                return CommandResult::Reply(err_response(&format!(
                    "passband {width} Hz not valid for {mode}"
                )));
            }
            match send_command(rx_tx, RxCommand::SetMode(mode)).await {
                Ok(_) => match passband {
                    Some(width) => set(rx_tx, RxCommand::SetFilterWidth(width)).await,
                    None => ok_only(),
                },
                Err(e) => err_response(&e),
            }
        }
        RemoteCommand::ListModes => mode_list(),
        RemoteCommand::GetLevel(Level::Strength) => {
            // The meter moves without commands, so ask for a fresh reading.
            match send_command(rx_tx, RxCommand::GetSnapshot).await {
                Ok(snapshot) => level_reply(&snapshot, Level::Strength),
                Err(e) => err_response(&e),
            }
        }
        RemoteCommand::GetLevel(level) => level_reply(&current_snapshot(state_rx), level),
        RemoteCommand::ListLevels => values(["SQL STRENGTH"]),
        RemoteCommand::SetSquelch(db) => set(rx_tx, RxCommand::SetSquelch(db)).await,
        RemoteCommand::ListSetLevels => values(["SQL"]),
        RemoteCommand::GetRecord => {
            let active = current_snapshot(state_rx).recording.is_active();
            values([if active { "1" } else { "0" }])
        }
        RemoteCommand::SetRecord(true) | RemoteCommand::Aos => {
            set(rx_tx, RxCommand::StartRecording).await
        }
        RemoteCommand::SetRecord(false) | RemoteCommand::Los => {
            set(rx_tx, RxCommand::StopRecording).await
        }
        RemoteCommand::GetLnbLo => values([current_snapshot(state_rx).lnb_lo_hz.to_string()]),
        RemoteCommand::SetLnbLo(hz) => set(rx_tx, RxCommand::SetLnbLo(hz)).await,
        RemoteCommand::DumpState => dump_state(&current_snapshot(state_rx)),
        RemoteCommand::GetHwFreq => values([current_snapshot(state_rx).center_freq.hz.to_string()]),
        RemoteCommand::SetHwFreq(hz) => set(rx_tx, RxCommand::SetFrequency(Freq::new(hz))).await,
        RemoteCommand::GetFilterOffset => {
            values([current_snapshot(state_rx).tuning_offset_hz.to_string()])
        }
        RemoteCommand::SetFilterOffset(hz) => set(rx_tx, RxCommand::SetTuningOffset(hz)).await,
    };

    CommandResult::Reply(resp)
}

fn err_response(msg: &str) -> String {
    warn!("remote command error: {}", msg);
    err_only()
}

async fn set(rx_tx: &mpsc::Sender<RxRequest>, cmd: RxCommand) -> String {
    match send_command(rx_tx, cmd).await {
        Ok(_) => ok_only(),
        Err(e) => err_response(&e),
    }
}

async fn send_command(
    rx_tx: &mpsc::Sender<RxRequest>,
    cmd: RxCommand,
) -> Result<RxSnapshot, String> {
    let (req, resp_rx) = RxRequest::new(cmd);
    rx_tx
        .send(req)
        .await
        .map_err(|e| format!("failed to send to receiver: {e:?}"))?;

    match timeout(RESPONSE_TIMEOUT, resp_rx).await {
        Ok(Ok(Ok(snapshot))) => Ok(snapshot),
        Ok(Ok(Err(err))) => Err(err.to_string()),
        Ok(Err(e)) => Err(format!("receiver response error: {e:?}")),
        Err(_) => Err("receiver response timeout".into()),
    }
}

fn current_snapshot(state_rx: &watch::Receiver<RxSnapshot>) -> RxSnapshot {
    state_rx.borrow().clone()
}
