// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;

use crate::radio::freq::Freq;
use crate::RxMode;

/// Internal command handled by the receiver task.
#[derive(Debug, Clone, PartialEq)]
pub enum RxCommand {
    GetSnapshot,
    /// Hardware (source) centre frequency.
    SetFrequency(Freq),
    /// Display frequency: retune the channel inside the span, else the hardware.
    Tune(i64),
    SetSampleRate(u32),
    SetTuningOffset(i64),
    SetFilterWidth(i32),
    SetFilterCenter(i32),
    /// Shape combo index (0 soft, 1 normal, 2 sharp).
    SetFilterShape(usize),
    SetMode(RxMode),
    /// AGC combo index (0 fast, 1 medium, 2 slow, 3 off).
    SetAgc(usize),
    SetSquelch(f64),
    SetAfGain(f32),
    SetRfGain(f64),
    /// Baseband gain in dB.
    SetBbGain(f64),
    SetLnbLo(i64),
    SetFmMaxDev(f32),
    /// De-emphasis time constant in microseconds, 0 disables.
    SetFmDeemph(f32),
    StartRecording,
    StopRecording,
    StartPlayback,
    StopPlayback,
    SaveSnapshotToFile(PathBuf),
    StopSnapshot,
    Pause,
    Resume,
}

impl RxCommand {
    /// Commands that only read state.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::GetSnapshot)
    }
}
