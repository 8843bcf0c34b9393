// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample-rate table and the rate arithmetic derived from it.

use crate::radio::mode::RxMode;
use crate::rx::error::{RxError, RxResult};

/// Every supported input rate is a multiple of this.
pub const SAMPLE_RATE_BASE: u32 = 250_000;

pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [250_000, 500_000, 1_000_000, 2_000_000, 4_000_000];

pub const DEFAULT_SAMPLE_RATE: u32 = 250_000;

/// Demodulator input rate for every mode except wide FM.
pub const NARROW_DEMOD_RATE: u32 = 50_000;

/// Demodulator input rate for wide FM.
pub const WIDE_DEMOD_RATE: u32 = 250_000;

pub const DEFAULT_AUDIO_RATE: u32 = 44_100;

pub fn validate_sample_rate(rate: u32) -> RxResult<u32> {
    if SUPPORTED_SAMPLE_RATES.contains(&rate) {
        Ok(rate)
    } else {
        Err(RxError::invalid_param(format!(
            "unsupported sample rate {rate} (supported: {SUPPORTED_SAMPLE_RATES:?})"
        )))
    }
}

/// Channelizer decimation for `mode` at `sample_rate`.
///
/// Fails when the rate is not an exact multiple of the mode's demodulator rate.
pub fn decimation(sample_rate: u32, mode: RxMode) -> RxResult<u32> {
    let demod_rate = mode.demod_rate();
    if sample_rate < demod_rate || sample_rate % demod_rate != 0 {
        return Err(RxError::invalid_param(format!(
            "sample rate {sample_rate} is not an integer multiple of {demod_rate}"
        )));
    }
    Ok(sample_rate / demod_rate)
}

/// Inclusive tuning offset range for a given sample rate.
pub fn tuning_range(sample_rate: u32) -> (i64, i64) {
    let half = i64::from(sample_rate / 2);
    (-half, half)
}

pub fn clamp_offset(offset: i64, sample_rate: u32) -> i64 {
    let (lo, hi) = tuning_range(sample_rate);
    offset.clamp(lo, hi)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Interpolation and decimation factors of the rational resampler taking
/// `input_rate` to `output_rate`.
pub fn resampler_ratio(input_rate: u32, output_rate: u32) -> RxResult<(u32, u32)> {
    if input_rate == 0 || output_rate == 0 {
        return Err(RxError::invalid_param("resampler rates must be non-zero"));
    }
    let g = gcd(input_rate, output_rate);
    Ok((output_rate / g, input_rate / g))
}
