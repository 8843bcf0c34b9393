// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;
use rx_core::radio::gain::AgcParams;

/// Smallest gain the loop may fall to.
const MIN_GAIN: f32 = 1e-4;

/// Two-rate envelope AGC on complex baseband.
///
/// The error `|y| - reference` is integrated into the gain with the attack
/// rate while the output is above the reference and the decay rate
/// otherwise. Gain is capped at `max_gain`.
#[derive(Debug, Clone)]
pub struct EnvelopeAgc {
    params: AgcParams,
    gain: f32,
}

impl EnvelopeAgc {
    pub fn new(params: AgcParams) -> Self {
        Self {
            gain: params.initial_gain,
            params,
        }
    }

    /// Swap loop constants; the current gain carries over.
    pub fn set_params(&mut self, params: AgcParams) {
        self.params = params;
        self.gain = self.gain.min(params.max_gain);
    }

    pub fn params(&self) -> AgcParams {
        self.params
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn process(&mut self, samples: &mut [Complex<f32>]) {
        let p = self.params;
        for sample in samples.iter_mut() {
            *sample *= self.gain;
            let magnitude = sample.norm();
            let error = magnitude - p.reference;
            let rate = if magnitude > p.reference {
                p.attack_rate
            } else {
                p.decay_rate
            };
            self.gain -= error * rate;
            if self.gain < 0.0 {
                self.gain = MIN_GAIN;
            }
            if p.max_gain > 0.0 && self.gain > p.max_gain {
                self.gain = p.max_gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_core::AgcSetting;

    fn constant(amplitude: f32, len: usize) -> Vec<Complex<f32>> {
        vec![Complex::new(amplitude, 0.0); len]
    }

    #[test]
    fn test_loud_signal_settles_at_reference() {
        let mut agc = EnvelopeAgc::new(AgcSetting::Fast.params().unwrap());
        let mut block = constant(2.0, 5000);
        agc.process(&mut block);
        assert!((block[4999].norm() - 0.5).abs() < 0.01);
        assert!((agc.gain() - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_loud_signal_after_silence_is_pulled_down_fast() {
        let mut agc = EnvelopeAgc::new(AgcSetting::Fast.params().unwrap());
        agc.process(&mut constant(1e-6, 300_000));
        assert_eq!(agc.gain(), 100.0);

        // 100 ms at the 50 kHz demod rate.
        let mut block = constant(0.1, 5000);
        agc.process(&mut block);
        assert!(block[4999].norm() < 1.0, "output {}", block[4999].norm());
        assert!((agc.gain() - 5.0).abs() < 0.5, "gain {}", agc.gain());
    }

    #[test]
    fn test_gain_ceiling() {
        let mut agc = EnvelopeAgc::new(AgcSetting::Fast.params().unwrap());
        let mut block = constant(1e-6, 300_000);
        agc.process(&mut block);
        assert_eq!(agc.gain(), 100.0);
    }

    #[test]
    fn test_slower_decay_recovers_slower() {
        let mut fast = EnvelopeAgc::new(AgcSetting::Fast.params().unwrap());
        let mut slow = EnvelopeAgc::new(AgcSetting::Slow.params().unwrap());
        fast.process(&mut constant(0.01, 1000));
        slow.process(&mut constant(0.01, 1000));
        assert!(fast.gain() > slow.gain());
        assert!(slow.gain() > 1.0);
    }

    #[test]
    fn test_set_params_clamps_gain() {
        let mut agc = EnvelopeAgc::new(AgcSetting::Fast.params().unwrap());
        agc.process(&mut constant(1e-6, 300_000));
        let mut params = AgcSetting::Slow.params().unwrap();
        params.max_gain = 10.0;
        agc.set_params(params);
        assert_eq!(agc.gain(), 10.0);
        assert_eq!(agc.params().decay_rate, 10e-6);
    }
}
