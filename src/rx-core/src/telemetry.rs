// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! In-process publish/subscribe bus for control events and data frames.
//!
//! Every message is a three-part frame `[topic, json-metadata, payload]`.
//! Topics are namespaced `control.*` and `data.*`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;

use crate::controller::events::RxListener;
use crate::controller::machine::RunState;
use crate::radio::filter::FilterSpec;
use crate::radio::mode::RxMode;

pub mod topics {
    pub const FFT_LINEAR: &str = "data.fft.linear";
    pub const FREQUENCY: &str = "control.frequency";
    pub const MODE: &str = "control.mode";
    pub const FILTER: &str = "control.filter";
    pub const SQUELCH: &str = "control.squelch";
    pub const RECORDING: &str = "control.recording";
    pub const PLAYBACK: &str = "control.playback";
    pub const RUN: &str = "control.run";
}

/// Metadata of one `data.fft.linear` frame.
///
/// The statistics fields are only present on frames decimated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FftMetadata {
    pub fftsize: usize,
    pub rate: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fftdecim: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxmax: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minmin: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minstd: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxstd: Option<f32>,
}

impl FftMetadata {
    pub fn new(fftsize: usize, rate: u32) -> Self {
        Self {
            fftsize,
            rate,
            timestamp: unix_millis(),
            fftdecim: None,
            avg: None,
            maxmax: None,
            minmin: None,
            minstd: None,
            maxstd: None,
        }
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One multipart message on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub topic: String,
    pub meta: Bytes,
    pub payload: Bytes,
}

impl TelemetryMessage {
    pub fn control<T: Serialize>(topic: &str, meta: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic.to_string(),
            meta: Bytes::from(serde_json::to_vec(meta)?),
            payload: Bytes::new(),
        })
    }

    /// `data.fft.linear` frame; bins are written as little-endian f32.
    pub fn fft_linear(meta: &FftMetadata, bins: &[f32]) -> Result<Self, serde_json::Error> {
        let mut payload = Vec::with_capacity(bins.len() * 4);
        for bin in bins {
            payload.extend_from_slice(&bin.to_le_bytes());
        }
        Ok(Self {
            topic: topics::FFT_LINEAR.to_string(),
            meta: Bytes::from(serde_json::to_vec(meta)?),
            payload: Bytes::from(payload),
        })
    }

    pub fn parts(&self) -> [Bytes; 3] {
        [
            Bytes::copy_from_slice(self.topic.as_bytes()),
            self.meta.clone(),
            self.payload.clone(),
        ]
    }

    pub fn meta_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.meta)
    }
}

/// Decode a little-endian f32 payload. Trailing partial words are dropped.
pub fn decode_bins(payload: &[u8]) -> Vec<f32> {
    payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cloneable handle to the broadcast bus.
#[derive(Debug, Clone)]
pub struct TelemetryBus {
    tx: broadcast::Sender<TelemetryMessage>,
}

impl TelemetryBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to all current subscribers; returns how many got it.
    pub fn publish(&self, msg: TelemetryMessage) -> usize {
        self.tx.send(msg).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Forwards receiver change events to the bus as `control.*` messages.
pub struct ControlPublisher {
    bus: TelemetryBus,
}

impl ControlPublisher {
    pub fn new(bus: TelemetryBus) -> Self {
        Self { bus }
    }

    fn send<T: Serialize>(&self, topic: &str, meta: &T) {
        match TelemetryMessage::control(topic, meta) {
            Ok(msg) => {
                self.bus.publish(msg);
            }
            Err(e) => debug!("Dropping {} telemetry: {}", topic, e),
        }
    }
}

impl RxListener for ControlPublisher {
    fn on_frequency_change(&self, old_hz: i64, new_hz: i64) {
        self.send(topics::FREQUENCY, &json!({ "old": old_hz, "frequency": new_hz }));
    }

    fn on_mode_change(&self, _old: RxMode, new: RxMode) {
        self.send(topics::MODE, &json!({ "mode": new.protocol_name() }));
    }

    fn on_filter_change(&self, filter: &FilterSpec) {
        self.send(topics::FILTER, filter);
    }

    fn on_squelch_change(&self, threshold_db: f64) {
        self.send(topics::SQUELCH, &json!({ "threshold_db": threshold_db }));
    }

    fn on_recording_change(&self, active: Option<&Path>) {
        let file = active.map(|p| p.display().to_string());
        self.send(topics::RECORDING, &json!({ "file": file }));
    }

    fn on_playback_change(&self, active: Option<&Path>) {
        let file = active.map(|p| p.display().to_string());
        self.send(topics::PLAYBACK, &json!({ "file": file }));
    }

    fn on_run_state_change(&self, _old: RunState, new: RunState) {
        self.send(topics::RUN, &new);
    }
}
