// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::TAU;

use num_complex::Complex;

/// Single-pole de-emphasis from the bilinear transform of `1 / (1 + s*tau)`,
/// `y[n] = b0 * (x[n] + x[n-1]) + p1 * y[n-1]`. Unity gain at DC.
#[derive(Debug, Clone)]
pub struct Deemphasis {
    b0: f32,
    p1: f32,
    x1: f32,
    y1: f32,
}

impl Deemphasis {
    pub fn new(sample_rate: f32, tau_us: f32) -> Self {
        let fs = sample_rate.max(1.0) as f64;
        let tau = tau_us.max(1e-3) as f64 * 1e-6;
        let w_ca = 2.0 * fs * (1.0 / (2.0 * fs * tau)).tan();
        let k = -w_ca / (2.0 * fs);
        Self {
            b0: (-k / (1.0 - k)) as f32,
            p1: ((1.0 + k) / (1.0 - k)) as f32,
            x1: 0.0,
            y1: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * (x + self.x1) + self.p1 * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }
}

/// Quadrature discriminator, `arg(s[n] * conj(s[n-1]))` scaled so the
/// maximum deviation maps to 1.0.
#[derive(Debug, Clone)]
pub struct FmDemod {
    sample_rate: f32,
    gain: f32,
    prev: Option<Complex<f32>>,
    deemph: Option<Deemphasis>,
}

impl FmDemod {
    /// `deemph_us == 0` disables de-emphasis.
    pub fn new(sample_rate: f32, max_dev_hz: f32, deemph_us: f32) -> Self {
        let mut demod = Self {
            sample_rate,
            gain: 1.0,
            prev: None,
            deemph: None,
        };
        demod.set_params(max_dev_hz, deemph_us);
        demod
    }

    pub fn set_params(&mut self, max_dev_hz: f32, deemph_us: f32) {
        self.gain = self.sample_rate / (TAU * max_dev_hz.max(1.0));
        self.deemph = (deemph_us > 0.0).then(|| Deemphasis::new(self.sample_rate, deemph_us));
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn process(&mut self, samples: &[Complex<f32>], output: &mut Vec<f32>) {
        for &sample in samples {
            let phase_step = match self.prev {
                Some(prev) => (sample * prev.conj()).arg(),
                None => 0.0,
            };
            self.prev = Some(sample);
            let audio = phase_step * self.gain;
            output.push(match self.deemph.as_mut() {
                Some(deemph) => deemph.process(audio),
                None => audio,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex_tone(freq_norm: f32, len: usize) -> Vec<Complex<f32>> {
        (0..len)
            .map(|n| Complex::from_polar(1.0, TAU * freq_norm * n as f32))
            .collect()
    }

    fn assert_approx_eq(a: f32, b: f32, tol: f32, label: &str) {
        assert!(
            (a - b).abs() <= tol,
            "{}: expected {} ~ {} (tol {})",
            label,
            a,
            b,
            tol
        );
    }

    #[test]
    fn test_max_deviation_maps_to_unity() {
        let mut fm = FmDemod::new(50_000.0, 5000.0, 0.0);
        assert_approx_eq(fm.gain(), 50_000.0 / (TAU * 5000.0), 1e-4, "gain");
        let mut out = Vec::new();
        fm.process(&complex_tone(5000.0 / 50_000.0, 64), &mut out);
        assert_eq!(out.len(), 64);
        assert_approx_eq(out[0], 0.0, 1e-6, "first sample");
        for (idx, &v) in out.iter().enumerate().skip(1) {
            assert_approx_eq(v, 1.0, 1e-3, &format!("sample {idx}"));
        }
    }

    #[test]
    fn test_negative_deviation() {
        let mut fm = FmDemod::new(50_000.0, 5000.0, 0.0);
        let mut out = Vec::new();
        fm.process(&complex_tone(-2500.0 / 50_000.0, 16), &mut out);
        assert_approx_eq(out[15], -0.5, 1e-3, "half negative");
    }

    #[test]
    fn test_history_spans_blocks() {
        let mut fm = FmDemod::new(50_000.0, 5000.0, 0.0);
        let tone = complex_tone(0.1, 32);
        let mut out = Vec::new();
        fm.process(&tone[..16], &mut out);
        out.clear();
        fm.process(&tone[16..], &mut out);
        assert_approx_eq(out[0], 1.0, 1e-3, "first of second block");
    }

    #[test]
    fn test_deemphasis_unity_dc() {
        let mut de = Deemphasis::new(50_000.0, 75.0);
        let mut y = 0.0;
        for _ in 0..5000 {
            y = de.process(1.0);
        }
        assert_approx_eq(y, 1.0, 1e-4, "dc");
    }

    #[test]
    fn test_deemphasis_attenuates_highs() {
        let mut de = Deemphasis::new(50_000.0, 75.0);
        let mut peak = 0.0_f32;
        for n in 0..10_000 {
            let x = (TAU * 10_000.0 * n as f32 / 50_000.0).sin();
            let y = de.process(x);
            if n > 5000 {
                peak = peak.max(y.abs());
            }
        }
        // Corner near 2.1 kHz, so 10 kHz sits well down the slope.
        assert!(peak < 0.3, "peak {peak}");
    }

    #[test]
    fn test_set_params_toggles_deemphasis() {
        let mut fm = FmDemod::new(250_000.0, 75_000.0, 75.0);
        assert!(fm.deemph.is_some());
        fm.set_params(75_000.0, 0.0);
        assert!(fm.deemph.is_none());
        fm.set_params(2500.0, 50.0);
        assert_approx_eq(fm.gain(), 250_000.0 / (TAU * 2500.0), 1e-3, "gain");
    }
}
