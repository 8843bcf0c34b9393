// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Audio and IQ outputs of the chain.

mod capture;
mod player;
mod recorder;

pub use capture::IqCapture;
pub use player::WavPlayer;
pub use recorder::{recording_file_name, unique_recording_path, WavRecorder};

use tokio::sync::broadcast;

/// Final audio destination after the AF gain stage.
pub trait AudioSink: Send + 'static {
    fn write(&mut self, samples: &[f32]);
}

/// Discards everything. Also stands in for the resampler output while a
/// recording is being played back.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _samples: &[f32]) {}
}

/// Publishes audio frames to any number of listeners; frames are dropped
/// when nobody listens.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<Vec<f32>>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<f32>> {
        self.tx.subscribe()
    }
}

impl AudioSink for ChannelSink {
    fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        // No receivers is not an error.
        let _ = self.tx.send(samples.to_vec());
    }
}
