// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::VecDeque;

use rx_core::radio::rates::resampler_ratio;
use rx_core::RxResult;

use super::filter::lowpass_taps;

/// Taps per polyphase branch when interpolating; scaled up when decimating.
const TAPS_PER_PHASE: usize = 16;
/// Prototype cutoff as a fraction of the narrower of the two Nyquist bands.
const RESAMP_CUTOFF: f32 = 0.9;

/// Rational polyphase resampler (interpolate by L, decimate by M).
///
/// The prototype low-pass runs at `L * input_rate`; branch `p` holds every
/// L-th coefficient starting at `p`.
pub struct RationalResampler {
    interp: usize,
    decim: usize,
    bank: Vec<Vec<f32>>,
    history: VecDeque<f32>,
    phase: usize,
}

impl RationalResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> RxResult<Self> {
        let (interp, decim) = resampler_ratio(input_rate, output_rate)?;
        let (interp, decim) = (interp as usize, decim as usize);

        let ratio = (decim as f32 / interp as f32).max(1.0);
        let taps_per_phase = (TAPS_PER_PHASE as f32 * ratio).ceil() as usize;
        let bank = if interp == 1 && decim == 1 {
            Vec::new()
        } else {
            // Half-band of the slower side, normalised to the prototype rate.
            let cutoff = RESAMP_CUTOFF * 0.5 / interp.max(decim) as f32;
            let prototype = lowpass_taps(cutoff, interp * taps_per_phase);
            (0..interp)
                .map(|p| {
                    (0..taps_per_phase)
                        .map(|k| prototype[k * interp + p] * interp as f32)
                        .collect()
                })
                .collect()
        };

        Ok(Self {
            interp,
            decim,
            bank,
            history: VecDeque::from(vec![0.0; taps_per_phase]),
            phase: 0,
        })
    }

    pub fn ratio(&self) -> (u32, u32) {
        (self.interp as u32, self.decim as u32)
    }

    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        if self.bank.is_empty() {
            output.extend_from_slice(input);
            return;
        }
        for &x in input {
            // Newest sample at the front.
            self.history.pop_back();
            self.history.push_front(x);
            while self.phase < self.interp {
                let y: f32 = self.bank[self.phase]
                    .iter()
                    .zip(self.history.iter())
                    .map(|(c, s)| c * s)
                    .sum();
                output.push(y);
                self.phase += self.decim;
            }
            self.phase -= self.interp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_and_length() {
        let mut rs = RationalResampler::new(50_000, 44_100).unwrap();
        assert_eq!(rs.ratio(), (441, 500));
        let input = vec![0.0; 50_000];
        let mut out = Vec::new();
        rs.process(&input, &mut out);
        assert!((out.len() as i64 - 44_100).abs() <= 1);
    }

    #[test]
    fn test_dc_gain_is_unity() {
        let mut rs = RationalResampler::new(250_000, 44_100).unwrap();
        let mut out = Vec::new();
        rs.process(&vec![1.0; 20_000], &mut out);
        let tail = &out[out.len() - 100..];
        for &y in tail {
            assert!((y - 1.0).abs() < 0.02, "got {y}");
        }
    }

    #[test]
    fn test_tone_frequency_preserved() {
        use std::f32::consts::TAU;

        let mut rs = RationalResampler::new(50_000, 44_100).unwrap();
        let input: Vec<f32> = (0..50_000)
            .map(|n| (TAU * 1000.0 * n as f32 / 50_000.0).sin())
            .collect();
        let mut out = Vec::new();
        rs.process(&input, &mut out);
        let crossings = out[1000..]
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        // About 1000 cycles per second, minus the skipped head.
        assert!((crossings as i64 - 977).abs() <= 3, "crossings {crossings}");
    }

    #[test]
    fn test_equal_rates_pass_through() {
        let mut rs = RationalResampler::new(44_100, 44_100).unwrap();
        let mut out = Vec::new();
        rs.process(&[0.1, 0.2, 0.3], &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(RationalResampler::new(0, 44_100).is_err());
    }
}
