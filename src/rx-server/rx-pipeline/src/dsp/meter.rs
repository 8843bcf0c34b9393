// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;
use rx_core::rx::state::SIGNAL_FLOOR_DBFS;

/// RMS power of a block in dBFS, floored at [`SIGNAL_FLOOR_DBFS`].
pub fn block_power_dbfs(samples: &[Complex<f32>]) -> f32 {
    if samples.is_empty() {
        return SIGNAL_FLOOR_DBFS;
    }
    let mean = samples.iter().map(|s| s.norm_sqr()).sum::<f32>() / samples.len() as f32;
    if mean <= 0.0 {
        return SIGNAL_FLOOR_DBFS;
    }
    (10.0 * mean.log10()).max(SIGNAL_FLOOR_DBFS)
}
