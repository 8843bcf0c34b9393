// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::rx::error::{RxError, RxResult};

pub const AF_GAIN_MAX: f32 = 5.0;

pub const SQUELCH_MIN_DB: f64 = -150.0;
pub const SQUELCH_MAX_DB: f64 = 0.0;
pub const DEFAULT_SQUELCH_DB: f64 = -100.0;

/// Baseband gain in dB to the linear multiplier applied to samples.
pub fn db_to_linear(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 10.0)
}

pub fn linear_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * gain.log10()
    }
}

/// AF gain slider position (0..=50) to linear gain.
pub fn af_gain_from_slider(position: i32) -> f32 {
    position as f32 / 10.0
}

pub fn validate_af_gain(gain: f32) -> RxResult<f32> {
    if gain.is_finite() && (0.0..=AF_GAIN_MAX).contains(&gain) {
        Ok(gain)
    } else {
        Err(RxError::invalid_param(format!(
            "AF gain {gain} outside 0.0..={AF_GAIN_MAX}"
        )))
    }
}

/// Loop constants for the two-rate envelope AGC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgcParams {
    pub attack_rate: f32,
    pub decay_rate: f32,
    pub reference: f32,
    pub initial_gain: f32,
    pub max_gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgcSetting {
    Fast,
    #[default]
    Medium,
    Slow,
    Off,
}

impl AgcSetting {
    pub fn from_index(idx: usize) -> RxResult<Self> {
        match idx {
            0 => Ok(Self::Fast),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Slow),
            3 => Ok(Self::Off),
            _ => Err(RxError::invalid_param(format!("unknown AGC index {idx}"))),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Fast => 0,
            Self::Medium => 1,
            Self::Slow => 2,
            Self::Off => 3,
        }
    }

    pub fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }

    /// Loop parameters, `None` when the stage is switched out.
    pub fn params(self) -> Option<AgcParams> {
        let decay_rate = match self {
            Self::Fast => 1e-3,
            Self::Medium => 50e-6,
            Self::Slow => 10e-6,
            Self::Off => return None,
        };
        Some(AgcParams {
            attack_rate: 0.1,
            decay_rate,
            reference: 0.5,
            initial_gain: 1.0,
            max_gain: 100.0,
        })
    }
}
