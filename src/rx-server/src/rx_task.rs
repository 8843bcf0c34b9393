// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Controller task: owns the [`Receiver`] and serialises every command sent
//! to it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use rx_core::controller::RxEventEmitter;
use rx_core::telemetry::ControlPublisher;
use rx_core::{DynResult, RxCommand, RxRequest, RxResult, RxSnapshot, TelemetryBus};
use rx_pipeline::{AudioSink, IqSource, Receiver, ReceiverConfig};

/// Commands slower than this are logged at warn level.
const SLOW_COMMAND: Duration = Duration::from_millis(500);

/// Everything the task needs to bring the receiver up.
pub struct RxTaskConfig {
    pub source: Box<dyn IqSource>,
    pub sink: Box<dyn AudioSink>,
    pub receiver: ReceiverConfig,
    pub telemetry: Option<TelemetryBus>,
    /// How often the signal meter is folded into the published state.
    pub meter_interval: Duration,
}

/// Start the receiver, publish its state and run commands until the
/// request channel closes or shutdown is signalled.
pub async fn run_rx_task(
    config: RxTaskConfig,
    mut rx: mpsc::Receiver<RxRequest>,
    state_tx: watch::Sender<RxSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> DynResult<()> {
    info!("Starting receiver");
    let RxTaskConfig {
        source,
        sink,
        receiver: receiver_config,
        telemetry,
        meter_interval,
    } = config;

    let mut receiver = tokio::task::block_in_place(|| {
        Receiver::start(source, sink, receiver_config, telemetry.clone())
    })?;

    let mut emitter = RxEventEmitter::new();
    if let Some(bus) = telemetry {
        emitter.register(Arc::new(ControlPublisher::new(bus)));
    }

    let mut state = receiver.snapshot();
    let _ = state_tx.send(state.clone());

    let mut meter = tokio::time::interval(meter_interval.max(Duration::from_millis(10)));
    meter.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = meter.tick() => {
                let level = receiver.snapshot();
                let changed = (level.signal_dbfs - state.signal_dbfs).abs() >= 0.1
                    || level.run_state != state.run_state;
                if changed {
                    emitter.notify_changes(&state, &level);
                    state = level;
                    let _ = state_tx.send(state.clone());
                }
            },

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("rx_task shutting down (shutdown requested)");
                    break;
                }
            },

            maybe_req = rx.recv() => {
                let Some(first_req) = maybe_req else {
                    info!("rx_task shutting down (channel closed)");
                    break;
                };

                // Batch up any pending requests
                let mut batch = vec![first_req];
                while let Ok(next) = rx.try_recv() {
                    batch.push(next);
                }

                for RxRequest { cmd, respond_to } in batch {
                    let cmd_label = format!("{:?}", cmd);
                    let started = Instant::now();

                    let old_state = state.clone();
                    let result = execute(&mut receiver, cmd);
                    if let Ok(snapshot) = &result {
                        emitter.notify_changes(&old_state, snapshot);
                        state = snapshot.clone();
                        let _ = state_tx.send(state.clone());
                    }
                    let _ = respond_to.send(result);

                    let elapsed = started.elapsed();
                    if elapsed > SLOW_COMMAND {
                        warn!("Rx command {} took {:?}", cmd_label, elapsed);
                    } else {
                        debug!("Rx command {} completed in {:?}", cmd_label, elapsed);
                    }
                }
            },
        }
    }

    tokio::task::block_in_place(|| receiver.shutdown());
    Ok(())
}

/// Run one command; pipeline pauses and file I/O block the worker thread.
fn execute(receiver: &mut Receiver, cmd: RxCommand) -> RxResult<RxSnapshot> {
    if cmd.is_query() {
        return Ok(receiver.snapshot());
    }
    let result = tokio::task::block_in_place(|| receiver.apply(cmd));
    if let Err(e) = &result {
        error!("Rx command failed: {}", e);
    }
    result
}
