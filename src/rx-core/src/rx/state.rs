// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::controller::machine::RunState;
use crate::radio::filter::{FilterShape, FilterSpec};
use crate::radio::freq::{Freq, FreqRange, GainRange};
use crate::radio::gain::{AgcSetting, DEFAULT_SQUELCH_DB};
use crate::radio::mode::{PipelineTemplate, RxMode};
use crate::radio::rates;
use crate::rx::error::{RxError, RxResult};

pub const DEFAULT_FM_MAX_DEV_HZ: f32 = 5000.0;
pub const WIDE_FM_MAX_DEV_HZ: f32 = 75_000.0;
pub const DEFAULT_FM_DEEMPH_US: f32 = 75.0;
/// Meter reading before the first block and for silence.
pub const SIGNAL_FLOOR_DBFS: f32 = -150.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingStatus {
    /// File currently being written.
    pub active: Option<PathBuf>,
    /// Most recently completed recording, the playback candidate.
    pub last: Option<PathBuf>,
}

impl RecordingStatus {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub file: Option<PathBuf>,
}

impl PlaybackStatus {
    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }
}

/// Receiver state held by the control surface.
///
/// The `with_*` builders return a validated copy with one parameter changed
/// and never touch `self`, so a caller can apply the copy to the pipeline and
/// commit it only once that succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    pub mode: RxMode,
    pub sample_rate: u32,
    pub audio_rate: u32,
    pub center_freq: Freq,
    pub tuning_offset_hz: i64,
    pub lnb_lo_hz: i64,
    pub filter: FilterSpec,
    pub filter_width_hz: i32,
    pub filter_center_hz: i32,
    pub filter_shape: FilterShape,
    pub squelch_db: f64,
    pub agc: AgcSetting,
    pub af_gain: f32,
    pub rf_gain_db: f64,
    /// Linear multiplier.
    pub bb_gain: f64,
    pub fm_max_dev_hz: f32,
    pub fm_deemph_us: f32,
    pub signal_dbfs: f32,
    pub freq_range: FreqRange,
    pub gain_range: GainRange,
    pub run_state: RunState,
    pub recording: RecordingStatus,
    pub playback: PlaybackStatus,
    pub iq_capture: Option<PathBuf>,
}

/// Snapshot handed back to command senders.
pub type RxSnapshot = PipelineState;

impl PipelineState {
    /// Startup defaults: centre of the device ranges, narrow FM, +/-5 kHz filter.
    pub fn new(
        freq_range: FreqRange,
        gain_range: GainRange,
        sample_rate: u32,
        audio_rate: u32,
    ) -> RxResult<Self> {
        rates::validate_sample_rate(sample_rate)?;
        if audio_rate == 0 {
            return Err(RxError::invalid_param("audio rate must be non-zero"));
        }
        let mode = RxMode::default();
        rates::decimation(sample_rate, mode)?;
        let filter = FilterSpec::default();
        Ok(Self {
            mode,
            sample_rate,
            audio_rate,
            center_freq: freq_range.midpoint(),
            tuning_offset_hz: 0,
            lnb_lo_hz: 0,
            filter,
            filter_width_hz: filter.width(),
            filter_center_hz: (filter.low + filter.high) / 2,
            filter_shape: FilterShape::default(),
            squelch_db: DEFAULT_SQUELCH_DB,
            agc: AgcSetting::default(),
            af_gain: 1.0,
            rf_gain_db: gain_range.midpoint(),
            bb_gain: 1.0,
            fm_max_dev_hz: DEFAULT_FM_MAX_DEV_HZ,
            fm_deemph_us: DEFAULT_FM_DEEMPH_US,
            signal_dbfs: SIGNAL_FLOOR_DBFS,
            freq_range,
            gain_range,
            run_state: RunState::default(),
            recording: RecordingStatus::default(),
            playback: PlaybackStatus::default(),
            iq_capture: None,
        })
    }

    pub fn decimation(&self) -> RxResult<u32> {
        rates::decimation(self.sample_rate, self.mode)
    }

    pub fn demod_rate(&self) -> u32 {
        self.mode.demod_rate()
    }

    pub fn template(&self) -> PipelineTemplate {
        self.mode.template()
    }

    /// Whether the AGC stage sits between squelch and demodulator.
    pub fn agc_in_path(&self) -> bool {
        self.template().has_agc() && !self.agc.is_off()
    }

    /// Deviation used by the FM discriminator for the current mode.
    pub fn effective_fm_dev(&self) -> f32 {
        if self.mode.is_wide() {
            WIDE_FM_MAX_DEV_HZ
        } else {
            self.fm_max_dev_hz
        }
    }

    /// Frequency shown to the user: hardware + channel offset + LNB LO,
    /// saturating at the i64 bounds.
    pub fn display_freq_hz(&self) -> i64 {
        i64::try_from(self.center_freq.hz)
            .unwrap_or(i64::MAX)
            .saturating_add(self.tuning_offset_hz)
            .saturating_add(self.lnb_lo_hz)
    }

    pub fn with_mode(&self, mode: RxMode) -> RxResult<Self> {
        rates::decimation(self.sample_rate, mode)?;
        let profile = mode.profile();
        let mut next = self.clone();
        next.mode = mode;
        next.filter_width_hz = profile.default_width;
        next.filter_center_hz = profile.default_center;
        next.filter = FilterSpec::from_center_width(
            profile.default_center,
            profile.default_width,
            next.filter_shape,
        )?;
        Ok(next)
    }

    pub fn with_filter_width(&self, width: i32) -> RxResult<Self> {
        let profile = self.mode.profile();
        if !profile.contains_width(width) {
            return Err(RxError::invalid_param(format!(
                "filter width {width} outside {}..={} for {}",
                profile.width_min, profile.width_max, self.mode
            )));
        }
        self.with_filter(self.filter_center_hz, width, self.filter_shape)
    }

    pub fn with_filter_center(&self, center: i32) -> RxResult<Self> {
        self.with_filter(center, self.filter_width_hz, self.filter_shape)
    }

    pub fn with_filter_shape(&self, shape_idx: usize) -> RxResult<Self> {
        let shape = FilterShape::from_index(shape_idx)?;
        self.with_filter(self.filter_center_hz, self.filter_width_hz, shape)
    }

    fn with_filter(&self, center: i32, width: i32, shape: FilterShape) -> RxResult<Self> {
        let filter = FilterSpec::from_center_width(center, width, shape)?;
        let nyquist = (self.demod_rate() / 2) as i32;
        if filter.low < -nyquist || filter.high > nyquist {
            return Err(RxError::invalid_param(format!(
                "passband {}..{} exceeds +/-{nyquist} Hz",
                filter.low, filter.high
            )));
        }
        let mut next = self.clone();
        next.filter = filter;
        next.filter_center_hz = center;
        next.filter_width_hz = width;
        next.filter_shape = shape;
        Ok(next)
    }

    /// New sample rate; the tuning offset is clamped into the new span.
    pub fn with_sample_rate(&self, rate: u32) -> RxResult<Self> {
        rates::validate_sample_rate(rate)?;
        rates::decimation(rate, self.mode)?;
        let mut next = self.clone();
        next.sample_rate = rate;
        next.tuning_offset_hz = rates::clamp_offset(self.tuning_offset_hz, rate);
        Ok(next)
    }

    pub fn with_tuning_offset(&self, offset: i64) -> RxResult<Self> {
        let (lo, hi) = rates::tuning_range(self.sample_rate);
        if !(lo..=hi).contains(&offset) {
            return Err(RxError::invalid_param(format!(
                "tuning offset {offset} outside {lo}..={hi}"
            )));
        }
        let mut next = self.clone();
        next.tuning_offset_hz = offset;
        Ok(next)
    }

    pub fn check_start_recording(&self) -> RxResult<()> {
        if let Some(active) = &self.recording.active {
            return Err(RxError::precondition(format!(
                "already recording to {}",
                active.display()
            )));
        }
        if self.playback.is_active() {
            return Err(RxError::precondition("cannot record during playback"));
        }
        Ok(())
    }

    pub fn check_stop_recording(&self) -> RxResult<()> {
        if self.recording.is_active() {
            Ok(())
        } else {
            Err(RxError::precondition("no audio recording to stop"))
        }
    }

    pub fn check_start_playback(&self) -> RxResult<&PathBuf> {
        if let Some(active) = &self.recording.active {
            return Err(RxError::precondition(format!(
                "cannot play while recording to {}",
                active.display()
            )));
        }
        if self.playback.is_active() {
            return Err(RxError::precondition("already playing audio"));
        }
        self.recording
            .last
            .as_ref()
            .ok_or_else(|| RxError::precondition("no audio recording to play"))
    }

    pub fn check_stop_playback(&self) -> RxResult<()> {
        if self.playback.is_active() {
            Ok(())
        } else {
            Err(RxError::precondition("no audio playback to stop"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PipelineState {
        PipelineState::new(
            FreqRange {
                min_hz: 50_000_000,
                max_hz: 2_000_000_000,
            },
            GainRange {
                min_db: 0.0,
                max_db: 50.0,
            },
            250_000,
            44_100,
        )
        .unwrap()
    }

    #[test]
    fn test_startup_defaults() {
        let s = state();
        assert_eq!(s.mode, RxMode::FmNarrow);
        assert_eq!(s.center_freq.hz, 1_025_000_000);
        assert_eq!(s.rf_gain_db, 25.0);
        assert_eq!(s.filter, FilterSpec::default());
        assert_eq!(s.filter_shape, FilterShape::Normal);
        assert_eq!(s.agc, AgcSetting::Medium);
        assert_eq!(s.decimation().unwrap(), 5);
        assert!(!s.agc_in_path());
    }

    #[test]
    fn test_rejects_unsupported_rate() {
        let err = PipelineState::new(
            FreqRange {
                min_hz: 0,
                max_hz: 10,
            },
            GainRange {
                min_db: 0.0,
                max_db: 1.0,
            },
            96_000,
            44_100,
        )
        .unwrap_err();
        assert!(matches!(err, RxError::InvalidParameter(_)));
    }

    #[test]
    fn test_mode_switch_resets_filter() {
        let s = state().with_mode(RxMode::Usb).unwrap();
        assert_eq!(s.filter_center_hz, 1500);
        assert_eq!(s.filter_width_hz, 2400);
        assert_eq!(s.filter.low, 300);
        assert_eq!(s.filter.high, 2700);
        assert!(s.agc_in_path());
    }

    #[test]
    fn test_wide_fm_round_trip_restores_narrow() {
        let start = state();
        let narrow = start.with_mode(RxMode::FmNarrow).unwrap();
        let wide = narrow.with_mode(RxMode::FmWide).unwrap();
        assert_eq!(wide.decimation().unwrap(), 1);
        let back = wide.with_mode(RxMode::FmNarrow).unwrap();
        assert_eq!(back.decimation().unwrap(), narrow.decimation().unwrap());
        assert_eq!(back.filter_width_hz, 10000);
        assert_eq!(back.filter_center_hz, 0);
        assert_eq!(back.filter, narrow.filter);
    }

    #[test]
    fn test_width_out_of_range_leaves_state() {
        let s = state().with_mode(RxMode::CwUpper).unwrap();
        assert!(matches!(
            s.with_filter_width(3010),
            Err(RxError::InvalidParameter(_))
        ));
        assert_eq!(s.filter_width_hz, 1400);
    }

    #[test]
    fn test_filter_center_keeps_width() {
        let s = state().with_mode(RxMode::Am).unwrap();
        let s = s.with_filter_center(2000).unwrap();
        assert_eq!(s.filter.low, -2000);
        assert_eq!(s.filter.high, 6000);
        assert!(s.with_filter_center(30_000).is_err());
    }

    #[test]
    fn test_sample_rate_clamps_offset() {
        let s = state().with_sample_rate(4_000_000).unwrap();
        let s = s.with_tuning_offset(1_500_000).unwrap();
        let s = s.with_sample_rate(500_000).unwrap();
        assert_eq!(s.tuning_offset_hz, 250_000);
        assert!(s.with_tuning_offset(250_001).is_err());
        assert!(state().with_sample_rate(3_000_000).is_err());
    }

    #[test]
    fn test_recording_preconditions() {
        let mut s = state();
        assert!(s.check_stop_recording().is_err());
        assert!(matches!(
            s.check_start_playback(),
            Err(RxError::Precondition(_))
        ));

        s.recording.active = Some(PathBuf::from("a.wav"));
        assert!(s.check_start_recording().is_err());
        assert!(s.check_start_playback().is_err());
        assert!(s.check_stop_recording().is_ok());

        s.recording.last = s.recording.active.take();
        assert_eq!(s.check_start_playback().unwrap(), &PathBuf::from("a.wav"));

        s.playback.file = Some(PathBuf::from("a.wav"));
        assert!(s.check_start_playback().is_err());
        assert!(s.check_start_recording().is_err());
        assert!(s.check_stop_playback().is_ok());
    }

    #[test]
    fn test_display_freq_includes_offsets() {
        let mut s = state();
        s.center_freq = Freq::new(69_450_000);
        s.tuning_offset_hz = -10_000;
        s.lnb_lo_hz = 74_550_000;
        assert_eq!(s.display_freq_hz(), 144_000_000 - 10_000);
    }

    #[test]
    fn test_display_freq_saturates() {
        let mut s = state();
        s.center_freq = Freq::new(100_000_000);
        s.lnb_lo_hz = i64::MAX;
        assert_eq!(s.display_freq_hz(), i64::MAX);
        s.lnb_lo_hz = i64::MIN;
        assert_eq!(s.display_freq_hz(), i64::MIN + 100_000_000);
    }
}
