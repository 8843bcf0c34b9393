// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;
use rx_core::FilterSpec;

use super::filter::{complex_bandpass_taps, lowpass_taps, tap_count, BlockFir};
use crate::IQ_BLOCK_SIZE;

/// Anti-alias cutoff as a fraction of the output rate.
const DECIM_CUTOFF: f32 = 0.45;
/// Anti-alias transition as a fraction of the output rate.
const DECIM_TRANSITION: f32 = 0.1;

/// Frequency-translating decimating filter.
///
/// Mixer by `-offset`, overlap-save anti-alias low-pass, integer decimation,
/// then the complex channel band-pass at the output rate. The band-pass
/// edges are relative to the tuning point, positive is higher RF.
pub struct Channelizer {
    sample_rate: u32,
    decim: usize,
    offset_hz: i64,
    mixer_phase: f64,
    mixer_phase_inc: f64,
    decim_lpf: Option<BlockFir>,
    decim_counter: usize,
    bpf: BlockFir,
    filter: FilterSpec,
    scratch_mixed: Vec<Complex<f32>>,
    scratch_filtered: Vec<Complex<f32>>,
    scratch_decimated: Vec<Complex<f32>>,
}

impl Channelizer {
    /// `decim` must already be validated as an exact integer ratio.
    pub fn new(sample_rate: u32, decim: u32, offset_hz: i64, filter: &FilterSpec) -> Self {
        let decim = decim.max(1) as usize;
        let out_rate = sample_rate as f32 / decim as f32;
        let decim_lpf = (decim > 1).then(|| {
            let taps = tap_count(sample_rate as f32, DECIM_TRANSITION * out_rate);
            let coeffs = lowpass_taps(DECIM_CUTOFF * out_rate / sample_rate as f32, taps);
            BlockFir::from_real(&coeffs, IQ_BLOCK_SIZE)
        });
        let bpf_block = IQ_BLOCK_SIZE / decim + 1;
        let bpf = BlockFir::new(&design_bpf(out_rate, filter), bpf_block);

        let mut channelizer = Self {
            sample_rate,
            decim,
            offset_hz: 0,
            mixer_phase: 0.0,
            mixer_phase_inc: 0.0,
            decim_lpf,
            decim_counter: 0,
            bpf,
            filter: *filter,
            scratch_mixed: Vec::with_capacity(IQ_BLOCK_SIZE),
            scratch_filtered: Vec::with_capacity(IQ_BLOCK_SIZE),
            scratch_decimated: Vec::with_capacity(bpf_block),
        };
        channelizer.set_offset(offset_hz);
        channelizer
    }

    pub fn set_offset(&mut self, offset_hz: i64) {
        self.offset_hz = offset_hz;
        self.mixer_phase_inc =
            std::f64::consts::TAU * offset_hz as f64 / self.sample_rate.max(1) as f64;
    }

    /// Replace the band-pass taps; history is kept.
    pub fn set_filter(&mut self, filter: &FilterSpec) {
        self.filter = *filter;
        self.bpf.set_taps(&design_bpf(self.output_rate() as f32, filter));
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn decimation(&self) -> u32 {
        self.decim as u32
    }

    pub fn output_rate(&self) -> u32 {
        self.sample_rate / self.decim as u32
    }

    pub fn offset_hz(&self) -> i64 {
        self.offset_hz
    }

    pub fn filter(&self) -> FilterSpec {
        self.filter
    }

    pub fn bpf_taps(&self) -> usize {
        self.bpf.n_taps()
    }

    pub fn process(&mut self, block: &[Complex<f32>], output: &mut Vec<Complex<f32>>) {
        output.clear();
        let n = block.len();
        if n == 0 {
            return;
        }

        self.scratch_mixed.clear();
        let phase_start = self.mixer_phase;
        let phase_inc = self.mixer_phase_inc;
        let (mut sin_phase, mut cos_phase) = phase_start.sin_cos();
        let (sin_inc, cos_inc) = phase_inc.sin_cos();
        for &sample in block {
            let lo = Complex::new(cos_phase as f32, -(sin_phase as f32));
            self.scratch_mixed.push(sample * lo);
            let next_sin = sin_phase * cos_inc + cos_phase * sin_inc;
            let next_cos = cos_phase * cos_inc - sin_phase * sin_inc;
            sin_phase = next_sin;
            cos_phase = next_cos;
        }
        // Re-anchor each block so the recursion never drifts off the unit circle.
        self.mixer_phase = (phase_start + n as f64 * phase_inc).rem_euclid(std::f64::consts::TAU);

        let filtered = match self.decim_lpf.as_mut() {
            Some(lpf) => {
                lpf.process(&self.scratch_mixed, &mut self.scratch_filtered);
                &self.scratch_filtered
            }
            None => &self.scratch_mixed,
        };

        self.scratch_decimated.clear();
        for &sample in filtered {
            if self.decim_counter == 0 {
                self.scratch_decimated.push(sample);
            }
            self.decim_counter += 1;
            if self.decim_counter >= self.decim {
                self.decim_counter = 0;
            }
        }

        self.bpf.process(&self.scratch_decimated, output);
    }
}

fn design_bpf(rate: f32, filter: &FilterSpec) -> Vec<Complex<f32>> {
    complex_bandpass_taps(
        rate,
        filter.low as f32,
        filter.high as f32,
        filter.transition as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_core::FilterShape;

    fn tone(freq_hz: f64, rate: u32, len: usize) -> Vec<Complex<f32>> {
        use std::f64::consts::TAU;

        (0..len)
            .map(|n| Complex::from_polar(1.0, (TAU * freq_hz * n as f64 / rate as f64) as f32))
            .collect()
    }

    fn run(ch: &mut Channelizer, input: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut all = Vec::new();
        let mut out = Vec::new();
        for block in input.chunks(IQ_BLOCK_SIZE) {
            ch.process(block, &mut out);
            all.extend_from_slice(&out);
        }
        all
    }

    fn tail_magnitude(samples: &[Complex<f32>], tail: usize) -> f32 {
        let start = samples.len() - tail;
        samples[start..].iter().map(|s| s.norm()).sum::<f32>() / tail as f32
    }

    #[test]
    fn test_offset_tone_lands_at_dc() {
        let mut ch = Channelizer::new(250_000, 5, 10_000, &FilterSpec::default());
        assert_eq!(ch.output_rate(), 50_000);
        let out = run(&mut ch, &tone(10_000.0, 250_000, 8 * IQ_BLOCK_SIZE));
        assert!((tail_magnitude(&out, 500) - 1.0).abs() < 0.05);
        // Mixed to DC: consecutive outputs share the same phase.
        let last = out[out.len() - 1];
        let prev = out[out.len() - 2];
        assert!((last * prev.conj()).arg().abs() < 0.01);
    }

    #[test]
    fn test_out_of_channel_tone_rejected() {
        let mut ch = Channelizer::new(250_000, 5, 10_000, &FilterSpec::default());
        let out = run(&mut ch, &tone(30_000.0, 250_000, 8 * IQ_BLOCK_SIZE));
        assert!(tail_magnitude(&out, 500) < 0.05);
    }

    #[test]
    fn test_filter_center_positive_is_higher_rf() {
        let usb = FilterSpec::from_center_width(1500, 2400, FilterShape::Normal).unwrap();
        let mut ch = Channelizer::new(250_000, 5, 20_000, &usb);
        let above = run(&mut ch, &tone(21_500.0, 250_000, 8 * IQ_BLOCK_SIZE));
        assert!((tail_magnitude(&above, 500) - 1.0).abs() < 0.05);

        let mut ch = Channelizer::new(250_000, 5, 20_000, &usb);
        let below = run(&mut ch, &tone(18_500.0, 250_000, 8 * IQ_BLOCK_SIZE));
        assert!(tail_magnitude(&below, 500) < 0.05);
    }

    #[test]
    fn test_decimation_carries_across_blocks() {
        let mut ch = Channelizer::new(4_000_000, 80, 0, &FilterSpec::default());
        let input = vec![Complex::new(0.0, 0.0); 10 * IQ_BLOCK_SIZE];
        let out = run(&mut ch, &input);
        assert_eq!(out.len(), 10 * IQ_BLOCK_SIZE / 80);
    }

    #[test]
    fn test_wide_path_skips_decimator() {
        let mut ch = Channelizer::new(250_000, 1, 0, &FilterSpec::default());
        let out = run(&mut ch, &vec![Complex::new(1.0, 0.0); IQ_BLOCK_SIZE]);
        assert_eq!(out.len(), IQ_BLOCK_SIZE);
    }

    #[test]
    fn test_live_retune_and_filter() {
        let mut ch = Channelizer::new(250_000, 5, 0, &FilterSpec::default());
        ch.set_offset(-40_000);
        assert_eq!(ch.offset_hz(), -40_000);
        let out = run(&mut ch, &tone(-40_000.0, 250_000, 8 * IQ_BLOCK_SIZE));
        assert!((tail_magnitude(&out, 500) - 1.0).abs() < 0.05);

        let narrow = FilterSpec::from_center_width(0, 1000, FilterShape::Sharp).unwrap();
        ch.set_filter(&narrow);
        assert_eq!(ch.filter(), narrow);
        assert!(ch.bpf_taps() > 61);
    }
}
