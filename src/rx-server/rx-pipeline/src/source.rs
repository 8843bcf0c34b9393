// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IQ sample sources.

use std::f64::consts::TAU;

use num_complex::Complex;
use rx_core::{Freq, FreqRange, GainRange};

/// Abstraction over any IQ sample source (hardware front end or synthetic).
///
/// Control calls come from the control surface between blocks; errors are
/// plain strings and surface as device rejections.
pub trait IqSource: Send + 'static {
    /// Read the next block of IQ samples into `buf`.
    /// Returns the number of samples written, or an error string.
    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, String>;

    fn set_center_freq(&mut self, hz: u64) -> Result<(), String>;

    fn set_gain(&mut self, gain_db: f64) -> Result<(), String>;

    fn set_sample_rate(&mut self, rate: u32) -> Result<(), String>;

    fn freq_range(&self) -> FreqRange;

    fn gain_range(&self) -> GainRange;

    /// Whether `read_into` blocks at the device rate. Free-running sources
    /// are throttled by the stream thread.
    fn is_paced(&self) -> bool {
        false
    }
}

/// A carrier at an absolute RF frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: u64,
    pub amplitude: f32,
}

/// Synthetic front end: sums carriers relative to the tuned centre and adds
/// uniform noise. With no tones and no noise it produces silence.
pub struct SyntheticSource {
    center_hz: u64,
    sample_rate: u32,
    gain_db: f64,
    freq_range: FreqRange,
    gain_range: GainRange,
    tones: Vec<Tone>,
    phases: Vec<f64>,
    noise_amplitude: f32,
    rng: u64,
}

impl SyntheticSource {
    pub fn new(freq_range: FreqRange, gain_range: GainRange, sample_rate: u32) -> Self {
        Self {
            center_hz: freq_range.midpoint().hz,
            sample_rate: sample_rate.max(1),
            gain_db: gain_range.max_db,
            freq_range,
            gain_range,
            tones: Vec::new(),
            phases: Vec::new(),
            noise_amplitude: 0.0,
            rng: 0x2545_f491_4f6c_dd1d,
        }
    }

    pub fn with_tones(mut self, tones: Vec<Tone>) -> Self {
        self.phases = vec![0.0; tones.len()];
        self.tones = tones;
        self
    }

    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude.max(0.0);
        self
    }

    pub fn center_hz(&self) -> u64 {
        self.center_hz
    }

    /// Linear level applied to the tones; full scale at the top of the gain range.
    fn level(&self) -> f32 {
        10f64.powf((self.gain_db - self.gain_range.max_db) / 20.0) as f32
    }

    // xorshift64, uniform in [-1, 1)
    fn next_noise(&mut self) -> f32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        (x >> 40) as f32 / (1u64 << 23) as f32 - 1.0
    }
}

impl IqSource for SyntheticSource {
    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, String> {
        let level = self.level();
        let rate = self.sample_rate as f64;
        let increments: Vec<f64> = self
            .tones
            .iter()
            .map(|tone| TAU * (tone.freq_hz as f64 - self.center_hz as f64) / rate)
            .collect();

        for sample in buf.iter_mut() {
            let mut acc = Complex::new(0.0_f32, 0.0_f32);
            for ((tone, phase), inc) in self
                .tones
                .iter()
                .zip(self.phases.iter_mut())
                .zip(increments.iter())
            {
                acc += Complex::from_polar(tone.amplitude * level, *phase as f32);
                *phase = (*phase + inc).rem_euclid(TAU);
            }
            if self.noise_amplitude > 0.0 {
                let re = self.next_noise();
                let im = self.next_noise();
                acc += Complex::new(re, im) * self.noise_amplitude;
            }
            *sample = acc;
        }
        Ok(buf.len())
    }

    fn set_center_freq(&mut self, hz: u64) -> Result<(), String> {
        if !self.freq_range.contains(Freq::new(hz)) {
            return Err(format!(
                "frequency {hz} Hz outside {}..={}",
                self.freq_range.min_hz, self.freq_range.max_hz
            ));
        }
        self.center_hz = hz;
        Ok(())
    }

    fn set_gain(&mut self, gain_db: f64) -> Result<(), String> {
        if !self.gain_range.contains(gain_db) {
            return Err(format!(
                "gain {gain_db} dB outside {}..={}",
                self.gain_range.min_db, self.gain_range.max_db
            ));
        }
        self.gain_db = gain_db;
        Ok(())
    }

    fn set_sample_rate(&mut self, rate: u32) -> Result<(), String> {
        if rate == 0 {
            return Err("sample rate must be non-zero".to_string());
        }
        self.sample_rate = rate;
        Ok(())
    }

    fn freq_range(&self) -> FreqRange {
        self.freq_range
    }

    fn gain_range(&self) -> GainRange {
        self.gain_range
    }
}
