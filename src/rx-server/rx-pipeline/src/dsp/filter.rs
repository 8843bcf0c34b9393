// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::PI;
use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const MIN_TAPS: usize = 31;
pub const MAX_TAPS: usize = 4095;

/// Tap count of a Hamming-windowed design for a given transition width:
/// `53 * fs / (22 * transition)`, made odd and clamped to
/// [`MIN_TAPS`, `MAX_TAPS`].
pub fn tap_count(sample_rate: f32, transition_hz: f32) -> usize {
    let estimate = (53.0 * sample_rate / (22.0 * transition_hz.max(1.0))).ceil();
    let taps = if estimate.is_finite() && estimate > 0.0 {
        estimate as usize
    } else {
        MAX_TAPS
    };
    taps.clamp(MIN_TAPS, MAX_TAPS) | 1
}

fn hamming(i: usize, taps: usize) -> f32 {
    if taps == 1 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * i as f32 / (taps - 1) as f32).cos()
}

/// Windowed-sinc low-pass with unity DC gain. `cutoff_norm` is the cutoff
/// divided by the sample rate.
pub fn lowpass_taps(cutoff_norm: f32, taps: usize) -> Vec<f32> {
    let taps = taps.max(1);
    let m = (taps - 1) as f32;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|i| {
            let x = i as f32 - m / 2.0;
            let sinc = if x == 0.0 {
                2.0 * cutoff_norm
            } else {
                (2.0 * PI * cutoff_norm * x).sin() / (PI * x)
            };
            sinc * hamming(i, taps)
        })
        .collect();
    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        for coeff in &mut coeffs {
            *coeff /= sum;
        }
    }
    coeffs
}

/// Complex band-pass passing `low..high` Hz (either edge may be negative).
///
/// A low-pass of half the bandwidth is shifted up by `(low + high) / 2`.
pub fn complex_bandpass_taps(
    sample_rate: f32,
    low: f32,
    high: f32,
    transition: f32,
) -> Vec<Complex<f32>> {
    let taps = tap_count(sample_rate, transition);
    let half_bw = ((high - low) / 2.0).max(1.0);
    let center = (low + high) / 2.0;
    let prototype = lowpass_taps(half_bw / sample_rate, taps);
    let mid = (taps - 1) as f32 / 2.0;
    let w = 2.0 * PI * center / sample_rate;
    prototype
        .iter()
        .enumerate()
        .map(|(i, &coeff)| Complex::from_polar(coeff, w * (i as f32 - mid)))
        .collect()
}

type FirKernel = (Vec<Complex<f32>>, usize, Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>);

fn build_fir_kernel(taps: &[Complex<f32>], block_size: usize) -> FirKernel {
    let fft_size = (block_size + taps.len() - 1).next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);
    let ifft = planner.plan_fft_inverse(fft_size);

    let mut h_buf = taps.to_vec();
    h_buf.resize(fft_size, Complex::new(0.0, 0.0));
    fft.process(&mut h_buf);

    (h_buf, fft_size, fft, ifft)
}

fn mul_freq_domain(buf: &mut [Complex<f32>], h_freq: &[Complex<f32>], scale: f32) {
    for (x, &h) in buf.iter_mut().zip(h_freq.iter()) {
        *x = *x * h * scale;
    }
}

/// Overlap-save FFT FIR over complex samples with complex taps.
///
/// Inputs longer than the block size are processed in block-sized chunks.
/// Replacing the taps keeps the sample history so the stream stays
/// continuous.
pub struct BlockFir {
    h_freq: Vec<Complex<f32>>,
    overlap: Vec<Complex<f32>>,
    n_taps: usize,
    block_size: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch_freq: Vec<Complex<f32>>,
}

impl BlockFir {
    pub fn new(taps: &[Complex<f32>], block_size: usize) -> Self {
        let taps = if taps.is_empty() {
            vec![Complex::new(1.0, 0.0)]
        } else {
            taps.to_vec()
        };
        let block_size = block_size.max(1);
        let (h_freq, fft_size, fft, ifft) = build_fir_kernel(&taps, block_size);
        Self {
            h_freq,
            overlap: vec![Complex::new(0.0, 0.0); taps.len() - 1],
            n_taps: taps.len(),
            block_size,
            fft_size,
            fft,
            ifft,
            scratch_freq: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn from_real(taps: &[f32], block_size: usize) -> Self {
        let taps: Vec<Complex<f32>> = taps.iter().map(|&t| Complex::new(t, 0.0)).collect();
        Self::new(&taps, block_size)
    }

    pub fn n_taps(&self) -> usize {
        self.n_taps
    }

    pub fn set_taps(&mut self, taps: &[Complex<f32>]) {
        if taps.is_empty() {
            return;
        }
        let (h_freq, fft_size, fft, ifft) = build_fir_kernel(taps, self.block_size);
        let new_overlap = taps.len() - 1;
        let keep = self.overlap.len().min(new_overlap);
        let mut overlap = vec![Complex::new(0.0, 0.0); new_overlap - keep];
        overlap.extend_from_slice(&self.overlap[self.overlap.len() - keep..]);

        self.h_freq = h_freq;
        self.overlap = overlap;
        self.n_taps = taps.len();
        self.fft_size = fft_size;
        self.fft = fft;
        self.ifft = ifft;
        self.scratch_freq = vec![Complex::new(0.0, 0.0); fft_size];
    }

    pub fn process(&mut self, input: &[Complex<f32>], output: &mut Vec<Complex<f32>>) {
        output.clear();
        output.reserve(input.len().saturating_sub(output.capacity()));
        for chunk in input.chunks(self.block_size) {
            self.process_chunk(chunk, output);
        }
    }

    fn process_chunk(&mut self, input: &[Complex<f32>], output: &mut Vec<Complex<f32>>) {
        let n_new = input.len();
        let n_overlap = self.n_taps - 1;

        let buf = &mut self.scratch_freq;
        buf.clear();
        buf.extend_from_slice(&self.overlap);
        buf.extend_from_slice(input);
        buf.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(buf);
        mul_freq_domain(buf, &self.h_freq, 1.0 / self.fft_size as f32);
        self.ifft.process(buf);

        output.extend_from_slice(&buf[n_overlap..n_overlap + n_new]);

        if n_overlap > 0 {
            if n_new >= n_overlap {
                self.overlap.copy_from_slice(&input[n_new - n_overlap..]);
            } else {
                let keep_old = n_overlap - n_new;
                self.overlap.copy_within(n_new..n_overlap, 0);
                self.overlap[keep_old..].copy_from_slice(input);
            }
        }
    }
}
