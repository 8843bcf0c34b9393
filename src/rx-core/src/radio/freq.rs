// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::rx::error::{RxError, RxResult};

/// Largest LNB LO magnitude accepted (1 THz either way).
pub const MAX_LNB_LO_HZ: i64 = 1_000_000_000_000;

/// Frequency wrapper (Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Freq {
    pub hz: u64,
}

impl Freq {
    #[must_use]
    pub fn new(hz: u64) -> Self {
        Self { hz }
    }

    /// Dotted MHz.kHz.Hz grouping, e.g. `144.300.000`.
    pub fn grouped(&self) -> String {
        let digits = format!("{:09}", self.hz);
        let split = digits.len() - 6;
        format!(
            "{}.{}.{}",
            &digits[..split],
            &digits[split..split + 3],
            &digits[split + 3..]
        )
    }
}

/// Tunable range reported by a sample source (inclusive, Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqRange {
    pub min_hz: u64,
    pub max_hz: u64,
}

impl FreqRange {
    pub fn contains(&self, freq: Freq) -> bool {
        freq.hz >= self.min_hz && freq.hz <= self.max_hz
    }

    #[must_use]
    pub fn midpoint(&self) -> Freq {
        Freq::new(self.min_hz + (self.max_hz - self.min_hz) / 2)
    }
}

/// RF gain range reported by a sample source (dB).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRange {
    pub min_db: f64,
    pub max_db: f64,
}

impl GainRange {
    pub fn contains(&self, gain_db: f64) -> bool {
        gain_db >= self.min_db && gain_db <= self.max_db
    }

    pub fn midpoint(&self) -> f64 {
        (self.min_db + self.max_db) / 2.0
    }
}

pub fn validate_lnb_lo(hz: i64) -> RxResult<i64> {
    if (-MAX_LNB_LO_HZ..=MAX_LNB_LO_HZ).contains(&hz) {
        Ok(hz)
    } else {
        Err(RxError::invalid_param(format!(
            "LNB LO {hz} Hz outside -{MAX_LNB_LO_HZ}..={MAX_LNB_LO_HZ}"
        )))
    }
}
