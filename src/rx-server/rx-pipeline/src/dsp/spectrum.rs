// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::PI;
use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Hann-windowed FFT of the wideband stream, emitted every N blocks as
/// DC-centred linear power bins.
pub struct SpectrumSnapshotter {
    fft_size: usize,
    interval_blocks: usize,
    hann_window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    counter: usize,
    buf: Vec<Complex<f32>>,
}

impl SpectrumSnapshotter {
    pub fn new(fft_size: usize, interval_blocks: usize) -> Self {
        let fft_size = fft_size.max(2);
        let hann_window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (fft_size - 1) as f32).cos()))
            .collect();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            interval_blocks: interval_blocks.max(1),
            hann_window,
            fft,
            counter: 0,
            buf: Vec::with_capacity(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Feed one block; returns bins when a frame is due.
    pub fn update(&mut self, samples: &[Complex<f32>]) -> Option<Vec<f32>> {
        self.counter += 1;
        if self.counter < self.interval_blocks {
            return None;
        }
        self.counter = 0;

        let take = samples.len().min(self.fft_size);
        self.buf.clear();
        self.buf.extend(
            samples[..take]
                .iter()
                .zip(self.hann_window.iter())
                .map(|(sample, w)| *sample * *w),
        );
        self.buf.resize(self.fft_size, Complex::new(0.0, 0.0));
        self.fft.process(&mut self.buf);

        let norm = 1.0 / (self.fft_size as f32 * self.fft_size as f32);
        let half = self.fft_size / 2;
        Some(
            self.buf[half..]
                .iter()
                .chain(self.buf[..half].iter())
                .map(|value| value.norm_sqr() * norm)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex_tone(freq_norm: f32, len: usize) -> Vec<Complex<f32>> {
        use std::f32::consts::TAU;

        (0..len)
            .map(|n| Complex::from_polar(1.0, TAU * freq_norm * n as f32))
            .collect()
    }

    fn peak_bin(bins: &[f32]) -> usize {
        bins.iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_interval_gating() {
        let mut snap = SpectrumSnapshotter::new(64, 3);
        let block = complex_tone(0.0, 64);
        assert!(snap.update(&block).is_none());
        assert!(snap.update(&block).is_none());
        assert!(snap.update(&block).is_some());
        assert!(snap.update(&block).is_none());
    }

    #[test]
    fn test_dc_centred_layout() {
        let mut snap = SpectrumSnapshotter::new(256, 1);
        let bins = snap.update(&complex_tone(0.0, 256)).unwrap();
        assert_eq!(bins.len(), 256);
        assert_eq!(peak_bin(&bins), 128);

        let bins = snap.update(&complex_tone(0.25, 256)).unwrap();
        assert_eq!(peak_bin(&bins), 192);

        let bins = snap.update(&complex_tone(-0.25, 256)).unwrap();
        assert_eq!(peak_bin(&bins), 64);
    }

    #[test]
    fn test_short_block_zero_padded() {
        let mut snap = SpectrumSnapshotter::new(128, 1);
        let bins = snap.update(&complex_tone(0.0, 16)).unwrap();
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|b| b.is_finite() && *b >= 0.0));
    }
}
