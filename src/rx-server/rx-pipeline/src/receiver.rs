// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Control surface: owns the [`PipelineState`] and the running [`Pipeline`].
//!
//! Every operation validates against a copy of the state, applies the change
//! to the pipeline and commits the copy only once that succeeded, so a failed
//! call leaves both untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use rx_core::radio::freq::validate_lnb_lo;
use rx_core::radio::gain::{db_to_linear, validate_af_gain, SQUELCH_MAX_DB, SQUELCH_MIN_DB};
use rx_core::radio::rates::{tuning_range, DEFAULT_AUDIO_RATE, DEFAULT_SAMPLE_RATE};
use rx_core::{
    AgcSetting, Freq, PipelineState, RxCommand, RxError, RxMode, RxResult, RxSnapshot,
    TelemetryBus,
};
use tracing::{debug, info, warn};

use crate::graph::{FlowGraph, LiveControls, SpectrumConfig, StageKind};
use crate::output::{unique_recording_path, AudioSink, IqCapture, WavPlayer, WavRecorder};
use crate::pipeline::Pipeline;
use crate::source::IqSource;

/// Lowest accepted narrow FM deviation.
const FM_MIN_DEV_HZ: f32 = 500.0;

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub sample_rate: u32,
    pub audio_rate: u32,
    pub recording_dir: PathBuf,
    pub initial_mode: RxMode,
    /// Hardware frequency at startup; the middle of the device range if unset.
    pub initial_freq_hz: Option<u64>,
    pub squelch_db: f64,
    pub spectrum: Option<SpectrumConfig>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            audio_rate: DEFAULT_AUDIO_RATE,
            recording_dir: PathBuf::from("."),
            initial_mode: RxMode::default(),
            initial_freq_hz: None,
            squelch_db: rx_core::radio::gain::DEFAULT_SQUELCH_DB,
            spectrum: None,
        }
    }
}

pub struct Receiver {
    state: PipelineState,
    pipeline: Pipeline,
    recording_dir: PathBuf,
    user_paused: bool,
}

fn validate_squelch(db: f64) -> RxResult<f64> {
    if db.is_finite() && (SQUELCH_MIN_DB..=SQUELCH_MAX_DB).contains(&db) {
        Ok(db)
    } else {
        Err(RxError::invalid_param(format!(
            "squelch {db} dB outside {SQUELCH_MIN_DB}..={SQUELCH_MAX_DB}"
        )))
    }
}

impl Receiver {
    /// Configure the source, wire the graph for the initial state and spawn
    /// the stream thread.
    pub fn start(
        mut source: Box<dyn IqSource>,
        sink: Box<dyn AudioSink>,
        config: ReceiverConfig,
        telemetry: Option<TelemetryBus>,
    ) -> RxResult<Self> {
        let mut state = PipelineState::new(
            source.freq_range(),
            source.gain_range(),
            config.sample_rate,
            config.audio_rate,
        )?;
        if config.initial_mode != state.mode {
            state = state.with_mode(config.initial_mode)?;
        }
        state.squelch_db = validate_squelch(config.squelch_db)?;
        if let Some(hz) = config.initial_freq_hz {
            let freq = Freq::new(hz);
            if !state.freq_range.contains(freq) {
                return Err(RxError::device_rejected(format!(
                    "initial frequency {hz} Hz outside {}..={}",
                    state.freq_range.min_hz, state.freq_range.max_hz
                )));
            }
            state.center_freq = freq;
        }

        source
            .set_sample_rate(state.sample_rate)
            .and_then(|()| source.set_center_freq(state.center_freq.hz))
            .and_then(|()| source.set_gain(state.rf_gain_db))
            .map_err(RxError::device_rejected)?;

        let live = Arc::new(LiveControls::from_state(&state));
        let graph = FlowGraph::new(&state, sink, live, config.spectrum, telemetry)?;
        let pipeline = Pipeline::start(source, graph)?;
        state.run_state = pipeline.run_state();
        info!(
            "Receiver started: {} Hz, {}, {} S/s",
            state.center_freq.hz, state.mode, state.sample_rate
        );

        Ok(Self {
            state,
            pipeline,
            recording_dir: config.recording_dir,
            user_paused: false,
        })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// State plus the live meter reading and run state.
    pub fn snapshot(&self) -> RxSnapshot {
        let mut snapshot = self.state.clone();
        snapshot.signal_dbfs = self.pipeline.live().signal_dbfs();
        snapshot.run_state = self.pipeline.run_state();
        snapshot
    }

    pub fn topology(&self) -> Vec<StageKind> {
        self.pipeline.update(|graph| graph.topology())
    }

    pub fn blocks_processed(&self) -> u64 {
        self.pipeline.blocks_processed()
    }

    pub fn apply(&mut self, cmd: RxCommand) -> RxResult<RxSnapshot> {
        match cmd {
            RxCommand::GetSnapshot => {}
            RxCommand::SetFrequency(freq) => self.set_frequency(freq)?,
            RxCommand::Tune(display_hz) => self.tune(display_hz)?,
            RxCommand::SetSampleRate(rate) => self.set_sample_rate(rate)?,
            RxCommand::SetTuningOffset(offset) => self.set_tuning_offset(offset)?,
            RxCommand::SetFilterWidth(width) => self.set_filter_width(width)?,
            RxCommand::SetFilterCenter(center) => self.set_filter_center(center)?,
            RxCommand::SetFilterShape(idx) => self.set_filter_shape(idx)?,
            RxCommand::SetMode(mode) => self.set_mode(mode)?,
            RxCommand::SetAgc(idx) => self.set_agc(idx)?,
            RxCommand::SetSquelch(db) => self.set_squelch(db)?,
            RxCommand::SetAfGain(gain) => self.set_af_gain(gain)?,
            RxCommand::SetRfGain(db) => self.set_rf_gain(db)?,
            RxCommand::SetBbGain(db) => self.set_bb_gain(db)?,
            RxCommand::SetLnbLo(hz) => self.set_lnb_lo(hz)?,
            RxCommand::SetFmMaxDev(hz) => self.set_fm_max_dev(hz)?,
            RxCommand::SetFmDeemph(tau_us) => self.set_fm_deemph(tau_us)?,
            RxCommand::StartRecording => self.start_recording()?,
            RxCommand::StopRecording => {
                self.stop_recording()?;
            }
            RxCommand::StartPlayback => self.start_playback()?,
            RxCommand::StopPlayback => self.stop_playback()?,
            RxCommand::SaveSnapshotToFile(path) => self.save_snapshot_to_file(&path)?,
            RxCommand::StopSnapshot => {
                self.stop_snapshot()?;
            }
            RxCommand::Pause => self.pause(),
            RxCommand::Resume => self.resume()?,
        }
        Ok(self.snapshot())
    }

    pub fn set_frequency(&mut self, freq: Freq) -> RxResult<()> {
        if !self.state.freq_range.contains(freq) {
            return Err(RxError::device_rejected(format!(
                "frequency {} Hz outside {}..={}",
                freq.hz, self.state.freq_range.min_hz, self.state.freq_range.max_hz
            )));
        }
        self.pipeline
            .with_source(|source| source.set_center_freq(freq.hz))?;
        self.state.center_freq = freq;
        debug!("Hardware frequency {} Hz", freq.hz);
        Ok(())
    }

    /// Move the displayed frequency. Inside 90% of the current span only the
    /// channel offset moves; outside it the hardware is retuned and the
    /// offset zeroed.
    pub fn tune(&mut self, display_hz: i64) -> RxResult<()> {
        let out_of_range =
            || RxError::invalid_param(format!("frequency {display_hz} Hz is out of range"));
        let hw_target = display_hz
            .checked_sub(self.state.lnb_lo_hz)
            .ok_or_else(out_of_range)?;
        let center = i64::try_from(self.state.center_freq.hz).map_err(|_| out_of_range())?;
        let offset = hw_target.checked_sub(center).ok_or_else(out_of_range)?;
        let (_, half_span) = tuning_range(self.state.sample_rate);
        if offset.unsigned_abs() < (half_span * 9 / 10).unsigned_abs() {
            return self.set_tuning_offset(offset);
        }
        let hw = u64::try_from(hw_target).map_err(|_| {
            RxError::device_rejected(format!("hardware frequency {hw_target} Hz is negative"))
        })?;
        self.set_frequency(Freq::new(hw))?;
        self.set_tuning_offset(0)
    }

    pub fn set_sample_rate(&mut self, rate: u32) -> RxResult<()> {
        let next = self.state.with_sample_rate(rate)?;
        if rate == self.state.sample_rate {
            return Ok(());
        }
        let old_rate = self.state.sample_rate;
        self.pipeline.reconfigure(|graph, source| {
            source
                .set_sample_rate(rate)
                .map_err(RxError::device_rejected)?;
            if let Err(err) = graph.rebuild(&next) {
                if let Err(e) = source.set_sample_rate(old_rate) {
                    warn!("Failed to restore sample rate {}: {}", old_rate, e);
                }
                return Err(err);
            }
            Ok(())
        })?;
        info!("Sample rate {} -> {}", old_rate, rate);
        self.state = next;
        Ok(())
    }

    pub fn set_tuning_offset(&mut self, offset: i64) -> RxResult<()> {
        let next = self.state.with_tuning_offset(offset)?;
        self.pipeline.update(|graph| graph.set_offset(offset));
        self.state = next;
        Ok(())
    }

    pub fn set_filter_width(&mut self, width: i32) -> RxResult<()> {
        let next = self.state.with_filter_width(width)?;
        self.commit_filter(next);
        Ok(())
    }

    pub fn set_filter_center(&mut self, center: i32) -> RxResult<()> {
        let next = self.state.with_filter_center(center)?;
        self.commit_filter(next);
        Ok(())
    }

    pub fn set_filter_shape(&mut self, shape_idx: usize) -> RxResult<()> {
        let next = self.state.with_filter_shape(shape_idx)?;
        self.commit_filter(next);
        Ok(())
    }

    fn commit_filter(&mut self, next: PipelineState) {
        let filter = next.filter;
        self.pipeline.update(|graph| graph.set_filter(&filter));
        debug!(
            "Filter {}..{} Hz, transition {}",
            filter.low, filter.high, filter.transition
        );
        self.state = next;
    }

    /// Switch demodulator. Selecting the current mode is a no-op.
    pub fn set_mode(&mut self, mode: RxMode) -> RxResult<()> {
        if mode == self.state.mode {
            return Ok(());
        }
        let next = self.state.with_mode(mode)?;
        self.pipeline.reconfigure(|graph, _| graph.rebuild(&next))?;
        info!("Mode {} -> {}", self.state.mode, mode);
        self.state = next;
        Ok(())
    }

    pub fn set_agc(&mut self, idx: usize) -> RxResult<()> {
        let setting = AgcSetting::from_index(idx)?;
        let mut next = self.state.clone();
        next.agc = setting;
        let params = if next.agc_in_path() {
            setting.params()
        } else {
            None
        };
        if next.agc_in_path() == self.state.agc_in_path() {
            self.pipeline.update(|graph| graph.set_agc(params));
        } else {
            // Inserting or removing a stage rewires the path.
            self.pipeline.reconfigure(|graph, _| {
                graph.set_agc(params);
                Ok(())
            })?;
        }
        self.state = next;
        Ok(())
    }

    pub fn set_squelch(&mut self, db: f64) -> RxResult<()> {
        let db = validate_squelch(db)?;
        self.pipeline.live().set_squelch_db(db as f32);
        self.state.squelch_db = db;
        Ok(())
    }

    pub fn set_af_gain(&mut self, gain: f32) -> RxResult<()> {
        let gain = validate_af_gain(gain)?;
        self.pipeline.live().set_af_gain(gain);
        self.state.af_gain = gain;
        Ok(())
    }

    pub fn set_rf_gain(&mut self, gain_db: f64) -> RxResult<()> {
        if !self.state.gain_range.contains(gain_db) {
            return Err(RxError::device_rejected(format!(
                "RF gain {gain_db} dB outside {}..={}",
                self.state.gain_range.min_db, self.state.gain_range.max_db
            )));
        }
        self.pipeline.with_source(|source| source.set_gain(gain_db))?;
        self.state.rf_gain_db = gain_db;
        Ok(())
    }

    /// Baseband gain in dB, applied as `10^(dB/10)`.
    pub fn set_bb_gain(&mut self, gain_db: f64) -> RxResult<()> {
        if !gain_db.is_finite() {
            return Err(RxError::invalid_param(format!("baseband gain {gain_db} dB")));
        }
        let linear = db_to_linear(gain_db);
        self.pipeline.live().set_bb_gain(linear as f32);
        self.state.bb_gain = linear;
        Ok(())
    }

    pub fn set_lnb_lo(&mut self, hz: i64) -> RxResult<()> {
        self.state.lnb_lo_hz = validate_lnb_lo(hz)?;
        Ok(())
    }

    pub fn set_fm_max_dev(&mut self, dev_hz: f32) -> RxResult<()> {
        let max = (self.state.demod_rate() / 2) as f32;
        if !dev_hz.is_finite() || !(FM_MIN_DEV_HZ..=max).contains(&dev_hz) {
            return Err(RxError::invalid_param(format!(
                "FM deviation {dev_hz} Hz outside {FM_MIN_DEV_HZ}..={max}"
            )));
        }
        let mut next = self.state.clone();
        next.fm_max_dev_hz = dev_hz;
        self.commit_fm(next);
        Ok(())
    }

    pub fn set_fm_deemph(&mut self, tau_us: f32) -> RxResult<()> {
        if !tau_us.is_finite() || tau_us < 0.0 {
            return Err(RxError::invalid_param(format!(
                "de-emphasis {tau_us} us must be >= 0"
            )));
        }
        let mut next = self.state.clone();
        next.fm_deemph_us = tau_us;
        self.commit_fm(next);
        Ok(())
    }

    fn commit_fm(&mut self, next: PipelineState) {
        if next.mode.is_fm() {
            let (dev, tau) = (next.effective_fm_dev(), next.fm_deemph_us);
            self.pipeline.update(|graph| graph.set_fm_params(dev, tau));
        }
        self.state = next;
    }

    pub fn start_recording(&mut self) -> RxResult<()> {
        self.state.check_start_recording()?;
        std::fs::create_dir_all(&self.recording_dir).map_err(|e| {
            RxError::io(format!("{}: {e}", self.recording_dir.display()))
        })?;
        let path = unique_recording_path(&self.recording_dir, &Local::now());
        let recorder = WavRecorder::create(&path, self.state.audio_rate)?;
        if let Some(stale) = self.pipeline.update(|graph| graph.attach_recorder(recorder)) {
            warn!("Replaced stale recorder for {}", stale.path().display());
        }
        info!("Recording to {}", path.display());
        self.state.recording.active = Some(path);
        Ok(())
    }

    /// Finalise the active recording. It becomes the playback candidate.
    pub fn stop_recording(&mut self) -> RxResult<PathBuf> {
        self.state.check_stop_recording()?;
        let recorder = self.pipeline.update(|graph| graph.detach_recorder());
        let active = self.state.recording.active.take();
        let Some(recorder) = recorder else {
            return Err(RxError::io(format!(
                "recording {} was aborted after a write error",
                active.map(|p| p.display().to_string()).unwrap_or_default()
            )));
        };
        let samples = recorder.samples_written();
        let path = recorder.finalize()?;
        info!("Recording {} closed ({} samples)", path.display(), samples);
        self.state.recording.last = Some(path.clone());
        Ok(path)
    }

    /// Replace live audio with a fresh looping player of the last recording.
    pub fn start_playback(&mut self) -> RxResult<()> {
        let path = self.state.check_start_playback()?.clone();
        let player = WavPlayer::open(&path)?;
        if player.sample_rate() != self.state.audio_rate {
            warn!(
                "{} is {} Hz, playing at {} Hz",
                path.display(),
                player.sample_rate(),
                self.state.audio_rate
            );
        }
        self.pipeline.reconfigure(|graph, _| {
            graph.attach_player(player);
            Ok(())
        })?;
        info!("Playing {}", path.display());
        self.state.playback.file = Some(path);
        Ok(())
    }

    pub fn stop_playback(&mut self) -> RxResult<()> {
        self.state.check_stop_playback()?;
        self.pipeline.reconfigure(|graph, _| {
            graph.detach_player();
            Ok(())
        })?;
        self.state.playback.file = None;
        info!("Playback stopped");
        Ok(())
    }

    /// Tap raw IQ after the baseband gain into `path`; replaces any capture
    /// already running.
    pub fn save_snapshot_to_file(&mut self, path: &Path) -> RxResult<()> {
        let capture = IqCapture::create(path)?;
        let previous = self
            .pipeline
            .reconfigure(|graph, _| Ok(graph.attach_capture(capture)))?;
        if let Some(previous) = previous {
            if let Err(e) = previous.finish() {
                warn!("Closing previous IQ capture failed: {}", e);
            }
        }
        info!("Capturing IQ to {}", path.display());
        self.state.iq_capture = Some(path.to_path_buf());
        Ok(())
    }

    pub fn stop_snapshot(&mut self) -> RxResult<PathBuf> {
        if self.state.iq_capture.is_none() {
            return Err(RxError::precondition("no IQ capture to stop"));
        }
        let capture = self.pipeline.update(|graph| graph.detach_capture());
        self.state.iq_capture = None;
        let capture =
            capture.ok_or_else(|| RxError::io("IQ capture was aborted after a write error"))?;
        let path = capture.finish()?;
        info!("IQ capture {} closed", path.display());
        Ok(path)
    }

    /// Hold the stream. A second pause while held is a no-op.
    pub fn pause(&mut self) {
        if self.user_paused {
            return;
        }
        self.pipeline.pause();
        self.user_paused = true;
        info!("Receiver paused");
    }

    pub fn resume(&mut self) -> RxResult<()> {
        if !self.user_paused {
            return Err(RxError::precondition("receiver is not paused"));
        }
        self.pipeline.resume();
        self.user_paused = false;
        info!("Receiver resumed");
        Ok(())
    }

    /// Close file outputs, then stop and join the stream thread.
    pub fn shutdown(mut self) {
        self.close_outputs();
    }

    fn close_outputs(&mut self) {
        if self.state.recording.is_active() {
            if let Err(e) = self.stop_recording() {
                warn!("Closing recording on shutdown failed: {}", e);
            }
        }
        if self.state.playback.is_active() {
            self.pipeline.update(|graph| graph.detach_player());
            self.state.playback.file = None;
        }
        if self.state.iq_capture.is_some() {
            if let Err(e) = self.stop_snapshot() {
                warn!("Closing IQ capture on shutdown failed: {}", e);
            }
        }
        if self.user_paused {
            self.pipeline.resume();
            self.user_paused = false;
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.close_outputs();
    }
}
