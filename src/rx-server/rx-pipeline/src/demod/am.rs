// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// Single-pole DC blocker, `y[n] = x[n] - x[n-1] + r * y[n-1]`.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub fn new(r: f32) -> Self {
        Self {
            r: r.clamp(0.9, 0.9999),
            x1: 0.0,
            y1: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.r * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }
}

/// AM envelope detector: magnitude of IQ with the carrier level removed.
#[derive(Debug, Clone)]
pub struct AmDemod {
    dc: DcBlocker,
}

impl Default for AmDemod {
    fn default() -> Self {
        Self::new()
    }
}

impl AmDemod {
    pub fn new() -> Self {
        Self {
            dc: DcBlocker::new(0.999),
        }
    }

    pub fn process(&mut self, samples: &[Complex<f32>], output: &mut Vec<f32>) {
        output.extend(samples.iter().map(|s| self.dc.process(s.norm())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_carrier_removed() {
        let mut am = AmDemod::new();
        let input = vec![Complex::new(0.6_f32, 0.8); 20_000];
        let mut out = Vec::new();
        am.process(&input, &mut out);
        assert_eq!(out.len(), 20_000);
        assert_approx_eq(out[0], 1.0, 1e-6, "first sample");
        assert_approx_eq(out[19_999], 0.0, 1e-3, "settled");
    }

    #[test]
    fn test_modulation_recovered() {
        use std::f32::consts::TAU;

        let mut am = AmDemod::new();
        let input: Vec<Complex<f32>> = (0..50_000)
            .map(|n| {
                let env = 1.0 + 0.5 * (TAU * 1000.0 * n as f32 / 50_000.0).sin();
                Complex::new(env, 0.0)
            })
            .collect();
        let mut out = Vec::new();
        am.process(&input, &mut out);
        let tail = &out[40_000..];
        let peak = tail.iter().fold(0.0_f32, |m, &v| m.max(v.abs()));
        assert_approx_eq(peak, 0.5, 0.02, "audio peak");
    }

    #[test]
    fn test_dc_blocker_clamps_pole() {
        let mut dc = DcBlocker::new(2.0);
        assert_eq!(dc.process(1.0), 1.0);
        assert!((dc.process(1.0) - 0.9999).abs() < 1e-6);
    }
}
