// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// SSB/CW detector: the real part of the sideband-filtered baseband.
pub(super) fn demod_real(samples: &[Complex<f32>], output: &mut Vec<f32>) {
    output.extend(samples.iter().map(|sample| sample.re));
}
