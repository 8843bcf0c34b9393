// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// Averaging constant of the power detector.
pub const SQUELCH_ALPHA: f32 = 0.0003;

/// Power squelch: mutes samples while the averaged power is below the
/// threshold.
#[derive(Debug, Clone)]
pub struct PowerSquelch {
    threshold_db: f32,
    alpha: f32,
    power: f32,
}

impl PowerSquelch {
    pub fn new(threshold_db: f32) -> Self {
        Self {
            threshold_db,
            alpha: SQUELCH_ALPHA,
            power: 0.0,
        }
    }

    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db;
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn is_open(&self) -> bool {
        10.0 * self.power.max(1e-30).log10() >= self.threshold_db
    }

    pub fn process(&mut self, samples: &mut [Complex<f32>]) {
        for sample in samples.iter_mut() {
            self.power += self.alpha * (sample.norm_sqr() - self.power);
            if !self.is_open() {
                *sample = Complex::new(0.0, 0.0);
            }
        }
    }
}
