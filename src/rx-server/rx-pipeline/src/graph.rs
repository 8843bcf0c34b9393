// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The wired receive chain.
//!
//! ```text
//! source -> bb_gain -+-> channelizer -> squelch -> [agc] -> demod -> resampler -+
//!                    |        |                                                 |
//!                    |        +-> meter                 [player, when playing] <+
//!                    +-> [iq capture]                              |
//!                    +-> [spectrum]               af_gain -> sink + [recorder]
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use num_complex::Complex;
use rx_core::radio::gain::AgcParams;
use rx_core::rx::state::SIGNAL_FLOOR_DBFS;
use rx_core::telemetry::FftMetadata;
use rx_core::{FilterSpec, PipelineState, RxResult, TelemetryBus, TelemetryMessage};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::demod::{DemodKind, Demodulator};
use crate::dsp::meter::block_power_dbfs;
use crate::dsp::{Channelizer, EnvelopeAgc, PowerSquelch, RationalResampler, SpectrumSnapshotter};
use crate::output::{AudioSink, IqCapture, WavPlayer, WavRecorder};

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

/// Scalars read by the stream thread once per block.
#[derive(Debug)]
pub struct LiveControls {
    af_gain: AtomicU32,
    bb_gain: AtomicU32,
    squelch_db: AtomicU32,
    signal_dbfs: AtomicU32,
}

impl LiveControls {
    pub fn new(af_gain: f32, bb_gain: f32, squelch_db: f32) -> Self {
        Self {
            af_gain: AtomicU32::new(af_gain.to_bits()),
            bb_gain: AtomicU32::new(bb_gain.to_bits()),
            squelch_db: AtomicU32::new(squelch_db.to_bits()),
            signal_dbfs: AtomicU32::new(SIGNAL_FLOOR_DBFS.to_bits()),
        }
    }

    pub fn from_state(state: &PipelineState) -> Self {
        Self::new(state.af_gain, state.bb_gain as f32, state.squelch_db as f32)
    }

    pub fn af_gain(&self) -> f32 {
        load_f32(&self.af_gain)
    }

    pub fn set_af_gain(&self, gain: f32) {
        store_f32(&self.af_gain, gain);
    }

    pub fn bb_gain(&self) -> f32 {
        load_f32(&self.bb_gain)
    }

    pub fn set_bb_gain(&self, gain: f32) {
        store_f32(&self.bb_gain, gain);
    }

    pub fn squelch_db(&self) -> f32 {
        load_f32(&self.squelch_db)
    }

    pub fn set_squelch_db(&self, db: f32) {
        store_f32(&self.squelch_db, db);
    }

    /// Channel power of the last processed block.
    pub fn signal_dbfs(&self) -> f32 {
        load_f32(&self.signal_dbfs)
    }

    fn set_signal_dbfs(&self, dbfs: f32) {
        store_f32(&self.signal_dbfs, dbfs);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumConfig {
    pub fft_size: usize,
    /// Publish one frame every this many IQ blocks.
    pub interval_blocks: usize,
}

/// One stage of the wired chain, in signal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageKind {
    BbGain,
    IqCapture,
    Spectrum,
    Channelizer { decimation: u32, bpf_taps: usize },
    Meter,
    Squelch,
    Agc,
    Demod { kind: DemodKind },
    Resampler { interp: u32, decim: u32 },
    /// Resampler output discarded while a recording plays back.
    NullSink,
    Player,
    AfGain,
    AudioSink,
    Recorder,
}

pub struct FlowGraph {
    live: Arc<LiveControls>,
    channelizer: Channelizer,
    squelch: PowerSquelch,
    agc: Option<EnvelopeAgc>,
    demod: Demodulator,
    demod_rate: u32,
    resampler: RationalResampler,
    audio_rate: u32,
    sink: Box<dyn AudioSink>,
    recorder: Option<WavRecorder>,
    player: Option<WavPlayer>,
    capture: Option<IqCapture>,
    spectrum: Option<SpectrumSnapshotter>,
    telemetry: Option<TelemetryBus>,
    blocks: u64,
    scratch_bb: Vec<Complex<f32>>,
    scratch_channel: Vec<Complex<f32>>,
    scratch_demod: Vec<f32>,
    scratch_resampled: Vec<f32>,
    scratch_played: Vec<f32>,
}

impl FlowGraph {
    pub fn new(
        state: &PipelineState,
        sink: Box<dyn AudioSink>,
        live: Arc<LiveControls>,
        spectrum: Option<SpectrumConfig>,
        telemetry: Option<TelemetryBus>,
    ) -> RxResult<Self> {
        let decim = state.decimation()?;
        let demod_rate = state.demod_rate();
        let resampler = RationalResampler::new(demod_rate, state.audio_rate)?;
        Ok(Self {
            channelizer: Channelizer::new(
                state.sample_rate,
                decim,
                state.tuning_offset_hz,
                &state.filter,
            ),
            squelch: PowerSquelch::new(live.squelch_db()),
            agc: agc_for(state).map(EnvelopeAgc::new),
            demod: Demodulator::for_mode(
                state.mode,
                demod_rate,
                state.effective_fm_dev(),
                state.fm_deemph_us,
            ),
            demod_rate,
            resampler,
            audio_rate: state.audio_rate,
            sink,
            recorder: None,
            player: None,
            capture: None,
            spectrum: spectrum
                .map(|cfg| SpectrumSnapshotter::new(cfg.fft_size, cfg.interval_blocks)),
            telemetry,
            blocks: 0,
            live,
            scratch_bb: Vec::new(),
            scratch_channel: Vec::new(),
            scratch_demod: Vec::new(),
            scratch_resampled: Vec::new(),
            scratch_played: Vec::new(),
        })
    }

    pub fn live(&self) -> &Arc<LiveControls> {
        &self.live
    }

    pub fn sample_rate(&self) -> u32 {
        self.channelizer.sample_rate()
    }

    pub fn demod_rate(&self) -> u32 {
        self.demod_rate
    }

    pub fn audio_rate(&self) -> u32 {
        self.audio_rate
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks
    }

    pub fn channel_filter(&self) -> FilterSpec {
        self.channelizer.filter()
    }

    pub fn tuning_offset(&self) -> i64 {
        self.channelizer.offset_hz()
    }

    pub fn agc_gain(&self) -> Option<f32> {
        self.agc.as_ref().map(EnvelopeAgc::gain)
    }

    pub fn set_filter(&mut self, filter: &FilterSpec) {
        self.channelizer.set_filter(filter);
    }

    pub fn set_offset(&mut self, offset_hz: i64) {
        self.channelizer.set_offset(offset_hz);
    }

    /// `None` takes the AGC out of the path; otherwise it is inserted or
    /// retuned in place.
    pub fn set_agc(&mut self, params: Option<AgcParams>) {
        let Some(params) = params else {
            self.agc = None;
            return;
        };
        match self.agc.as_mut() {
            Some(agc) => agc.set_params(params),
            None => self.agc = Some(EnvelopeAgc::new(params)),
        }
    }

    pub fn set_fm_params(&mut self, max_dev_hz: f32, deemph_us: f32) {
        self.demod.set_fm_params(max_dev_hz, deemph_us);
    }

    /// Rewire for a new mode or sample rate.
    ///
    /// Everything fallible is built before anything is replaced, so an error
    /// leaves the graph as it was.
    pub fn rebuild(&mut self, state: &PipelineState) -> RxResult<()> {
        let decim = state.decimation()?;
        let demod_rate = state.demod_rate();
        let resampler = if demod_rate != self.demod_rate || state.audio_rate != self.audio_rate {
            Some(RationalResampler::new(demod_rate, state.audio_rate)?)
        } else {
            None
        };

        if decim != self.channelizer.decimation() || state.sample_rate != self.sample_rate() {
            debug!(
                "Rebuilding channelizer: {} Hz / {}",
                state.sample_rate, decim
            );
            self.channelizer = Channelizer::new(
                state.sample_rate,
                decim,
                state.tuning_offset_hz,
                &state.filter,
            );
        } else {
            self.channelizer.set_offset(state.tuning_offset_hz);
            self.channelizer.set_filter(&state.filter);
        }
        if let Some(resampler) = resampler {
            self.resampler = resampler;
            self.demod_rate = demod_rate;
            self.audio_rate = state.audio_rate;
        }
        self.demod = Demodulator::for_mode(
            state.mode,
            demod_rate,
            state.effective_fm_dev(),
            state.fm_deemph_us,
        );
        self.set_agc(agc_for(state));
        Ok(())
    }

    pub fn attach_recorder(&mut self, recorder: WavRecorder) -> Option<WavRecorder> {
        self.recorder.replace(recorder)
    }

    pub fn detach_recorder(&mut self) -> Option<WavRecorder> {
        self.recorder.take()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn attach_player(&mut self, player: WavPlayer) {
        self.player = Some(player);
    }

    pub fn detach_player(&mut self) -> Option<WavPlayer> {
        self.player.take()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_some()
    }

    pub fn attach_capture(&mut self, capture: IqCapture) -> Option<IqCapture> {
        self.capture.replace(capture)
    }

    pub fn detach_capture(&mut self) -> Option<IqCapture> {
        self.capture.take()
    }

    pub fn topology(&self) -> Vec<StageKind> {
        let mut stages = vec![StageKind::BbGain];
        if self.capture.is_some() {
            stages.push(StageKind::IqCapture);
        }
        if self.spectrum.is_some() {
            stages.push(StageKind::Spectrum);
        }
        stages.push(StageKind::Channelizer {
            decimation: self.channelizer.decimation(),
            bpf_taps: self.channelizer.bpf_taps(),
        });
        stages.push(StageKind::Meter);
        stages.push(StageKind::Squelch);
        if self.agc.is_some() {
            stages.push(StageKind::Agc);
        }
        stages.push(StageKind::Demod {
            kind: self.demod.kind(),
        });
        let (interp, decim) = self.resampler.ratio();
        stages.push(StageKind::Resampler { interp, decim });
        if self.player.is_some() {
            stages.push(StageKind::NullSink);
            stages.push(StageKind::Player);
        }
        stages.push(StageKind::AfGain);
        stages.push(StageKind::AudioSink);
        if self.recorder.is_some() {
            stages.push(StageKind::Recorder);
        }
        stages
    }

    /// Run one IQ block through every stage.
    pub fn process_block(&mut self, iq: &[Complex<f32>]) {
        self.blocks += 1;

        let bb_gain = self.live.bb_gain();
        self.scratch_bb.clear();
        self.scratch_bb.extend(iq.iter().map(|s| *s * bb_gain));

        if let Some(capture) = self.capture.as_mut() {
            if let Err(e) = capture.write(&self.scratch_bb) {
                error!("IQ capture to {} failed: {}", capture.path().display(), e);
                self.capture = None;
            }
        }

        if let Some(spectrum) = self.spectrum.as_mut() {
            if let Some(bins) = spectrum.update(&self.scratch_bb) {
                if let Some(bus) = &self.telemetry {
                    let meta = FftMetadata::new(bins.len(), self.channelizer.sample_rate());
                    match TelemetryMessage::fft_linear(&meta, &bins) {
                        Ok(msg) => {
                            bus.publish(msg);
                        }
                        Err(e) => debug!("Dropping spectrum frame: {}", e),
                    }
                }
            }
        }

        self.channelizer
            .process(&self.scratch_bb, &mut self.scratch_channel);
        self.live
            .set_signal_dbfs(block_power_dbfs(&self.scratch_channel));

        self.squelch.set_threshold(self.live.squelch_db());
        self.squelch.process(&mut self.scratch_channel);

        if let Some(agc) = self.agc.as_mut() {
            agc.process(&mut self.scratch_channel);
        }

        self.demod
            .process(&self.scratch_channel, &mut self.scratch_demod);
        self.resampler
            .process(&self.scratch_demod, &mut self.scratch_resampled);

        let audio = match self.player.as_mut() {
            Some(player) => {
                player.read(self.scratch_resampled.len(), &mut self.scratch_played);
                &mut self.scratch_played
            }
            None => &mut self.scratch_resampled,
        };

        let af_gain = self.live.af_gain();
        for sample in audio.iter_mut() {
            *sample *= af_gain;
        }
        self.sink.write(audio.as_slice());

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write(audio.as_slice()) {
                warn!("Recording to {} aborted: {}", recorder.path().display(), e);
                self.recorder = None;
            }
        }
    }
}

fn agc_for(state: &PipelineState) -> Option<AgcParams> {
    if state.agc_in_path() {
        state.agc.params()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ChannelSink;
    use crate::IQ_BLOCK_SIZE;
    use rx_core::{AgcSetting, FreqRange, GainRange, RxMode};

    fn state() -> PipelineState {
        PipelineState::new(
            FreqRange {
                min_hz: 100_000_000,
                max_hz: 200_000_000,
            },
            GainRange {
                min_db: 0.0,
                max_db: 40.0,
            },
            250_000,
            44_100,
        )
        .unwrap()
    }

    fn graph(state: &PipelineState) -> (FlowGraph, tokio::sync::broadcast::Receiver<Vec<f32>>) {
        let sink = ChannelSink::new(1024);
        let rx = sink.subscribe();
        let live = Arc::new(LiveControls::from_state(state));
        let g = FlowGraph::new(state, Box::new(sink), live, None, None).unwrap();
        (g, rx)
    }

    fn tone(freq_hz: f64, len: usize, amplitude: f32) -> Vec<Complex<f32>> {
        use std::f64::consts::TAU;

        (0..len)
            .map(|n| Complex::from_polar(amplitude, (TAU * freq_hz * n as f64 / 250_000.0) as f32))
            .collect()
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Vec<f32>>) -> Vec<f32> {
        let mut all = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            all.extend(frame);
        }
        all
    }

    #[test]
    fn test_default_topology() {
        let (g, _rx) = graph(&state());
        assert_eq!(
            g.topology(),
            vec![
                StageKind::BbGain,
                StageKind::Channelizer {
                    decimation: 5,
                    bpf_taps: 61
                },
                StageKind::Meter,
                StageKind::Squelch,
                StageKind::Demod {
                    kind: DemodKind::Fm
                },
                StageKind::Resampler {
                    interp: 441,
                    decim: 500
                },
                StageKind::AfGain,
                StageKind::AudioSink,
            ]
        );
    }

    #[test]
    fn test_agc_wired_for_ssb() {
        let (mut g, _rx) = graph(&state());
        let usb = state().with_mode(RxMode::Usb).unwrap();
        g.rebuild(&usb).unwrap();
        let topo = g.topology();
        assert!(topo.contains(&StageKind::Agc));
        assert!(topo.contains(&StageKind::Demod {
            kind: DemodKind::Ssb
        }));

        let mut off = usb.clone();
        off.agc = AgcSetting::Off;
        g.rebuild(&off).unwrap();
        assert!(!g.topology().contains(&StageKind::Agc));
    }

    #[test]
    fn test_wide_fm_rebuilds_rates() {
        let (mut g, _rx) = graph(&state());
        let wide = state().with_mode(RxMode::FmWide).unwrap();
        g.rebuild(&wide).unwrap();
        assert_eq!(g.demod_rate(), 250_000);
        assert!(g.topology().contains(&StageKind::Resampler {
            interp: 441,
            decim: 2500
        }));

        let narrow = wide.with_mode(RxMode::FmNarrow).unwrap();
        g.rebuild(&narrow).unwrap();
        assert_eq!(g.demod_rate(), 50_000);
        assert_eq!(g.channel_filter(), narrow.filter);
    }

    #[test]
    fn test_audio_flows_and_meter_updates() {
        let s = state();
        let (mut g, mut rx) = graph(&s);
        let input = tone(1000.0, IQ_BLOCK_SIZE, 0.5);
        for _ in 0..4 {
            g.process_block(&input);
        }
        let audio = drain(&mut rx);
        // 4096 samples at 250 kHz are ~722.5 samples at 44.1 kHz.
        assert!((audio.len() as i64 - 4 * 722).abs() <= 4, "len {}", audio.len());
        assert!((g.live().signal_dbfs() + 6.0).abs() < 0.5);
        assert_eq!(g.blocks_processed(), 4);
    }

    #[test]
    fn test_squelch_mutes_audio() {
        let mut s = state();
        s.squelch_db = -3.0;
        let (mut g, mut rx) = graph(&s);
        // A steady 1 kHz FM carrier demodulates to a constant.
        let input = tone(1000.0, IQ_BLOCK_SIZE, 0.5);
        for _ in 0..4 {
            g.process_block(&input);
        }
        let audio = drain(&mut rx);
        assert!(!audio.is_empty());
        assert!(audio.iter().all(|&a| a == 0.0));

        g.live().set_squelch_db(-150.0);
        for _ in 0..4 {
            g.process_block(&input);
        }
        let audio = drain(&mut rx);
        assert!(audio.iter().any(|&a| a.abs() > 0.1));
    }

    #[test]
    fn test_af_gain_zero_silences() {
        let s = state();
        let (mut g, mut rx) = graph(&s);
        g.live().set_af_gain(0.0);
        let input = tone(1000.0, IQ_BLOCK_SIZE, 0.5);
        g.process_block(&input);
        assert!(drain(&mut rx).iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_recorder_and_player_wiring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.wav");
        let s = state();
        let (mut g, mut rx) = graph(&s);

        g.attach_recorder(WavRecorder::create(&path, 44_100).unwrap());
        assert_eq!(g.topology().last(), Some(&StageKind::Recorder));
        let input = tone(1000.0, IQ_BLOCK_SIZE, 0.5);
        g.process_block(&input);
        let rec = g.detach_recorder().unwrap();
        assert!(rec.samples_written() > 700);
        rec.finalize().unwrap();
        drain(&mut rx);

        g.attach_player(WavPlayer::open(&path).unwrap());
        let topo = g.topology();
        assert!(topo.contains(&StageKind::NullSink));
        assert!(topo.contains(&StageKind::Player));
        // Silence in, recorded audio out.
        g.process_block(&vec![Complex::new(0.0, 0.0); IQ_BLOCK_SIZE]);
        let played = drain(&mut rx);
        assert!(played.iter().any(|&a| a != 0.0));
        assert!(g.detach_player().is_some());
        assert!(!g.is_playing());
    }

    #[test]
    fn test_capture_writes_bb_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.iq");
        let s = state();
        let (mut g, _rx) = graph(&s);
        g.live().set_bb_gain(2.0);
        assert!(g.attach_capture(IqCapture::create(&path).unwrap()).is_none());
        assert_eq!(g.topology()[1], StageKind::IqCapture);
        g.process_block(&[Complex::new(0.25, -0.5); 8]);
        g.detach_capture().unwrap().finish().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 8 * 8);
        assert_eq!(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]), 0.5);
        assert_eq!(f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]), -1.0);
    }

    #[tokio::test]
    async fn test_spectrum_published() {
        let s = state();
        let bus = TelemetryBus::new(8);
        let mut sub = bus.subscribe();
        let live = Arc::new(LiveControls::from_state(&s));
        let mut g = FlowGraph::new(
            &s,
            Box::new(crate::output::NullSink),
            live,
            Some(SpectrumConfig {
                fft_size: 512,
                interval_blocks: 2,
            }),
            Some(bus),
        )
        .unwrap();
        let input = tone(62_500.0, IQ_BLOCK_SIZE, 1.0);
        g.process_block(&input);
        assert!(sub.try_recv().is_err());
        g.process_block(&input);
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.topic, "data.fft.linear");
        let meta = msg.meta_json().unwrap();
        assert_eq!(meta["fftsize"], 512);
        assert_eq!(meta["rate"], 250_000);
        let bins = rx_core::telemetry::decode_bins(&msg.payload);
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 384);
    }
}
