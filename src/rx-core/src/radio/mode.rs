// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver modes and their per-mode filter profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::radio::rates::{NARROW_DEMOD_RATE, WIDE_DEMOD_RATE};
use crate::rx::error::{RxError, RxResult};

/// Demodulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RxMode {
    Am,
    #[default]
    FmNarrow,
    FmWide,
    Lsb,
    Usb,
    CwLower,
    CwUpper,
}

/// Slider range and defaults for the filter of one mode (all Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    pub width_min: i32,
    pub width_max: i32,
    pub width_step: i32,
    pub default_center: i32,
    pub default_width: i32,
}

impl ModeProfile {
    pub fn contains_width(&self, width: i32) -> bool {
        (self.width_min..=self.width_max).contains(&width)
    }
}

/// Wiring template shared by a class of modes.
///
/// FM demodulators limit on their own, so the AGC stage is left out of
/// their chain. Every other mode runs AGC right before the demodulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineTemplate {
    FmClass,
    AgcClass,
}

impl PipelineTemplate {
    pub fn has_agc(self) -> bool {
        matches!(self, Self::AgcClass)
    }
}

const fn profile(min: i32, max: i32, step: i32, center: i32, width: i32) -> ModeProfile {
    ModeProfile {
        width_min: min,
        width_max: max,
        width_step: step,
        default_center: center,
        default_width: width,
    }
}

/// Mode table, indexed by [`RxMode::index`].
const MODE_TABLE: [(RxMode, ModeProfile, PipelineTemplate); 7] = [
    (RxMode::Am, profile(1000, 15000, 100, 0, 8000), PipelineTemplate::AgcClass),
    (RxMode::FmNarrow, profile(1000, 15000, 100, 0, 10000), PipelineTemplate::FmClass),
    (RxMode::FmWide, profile(50000, 200000, 1000, 0, 160000), PipelineTemplate::FmClass),
    (RxMode::Lsb, profile(1000, 5000, 50, -1500, 2400), PipelineTemplate::AgcClass),
    (RxMode::Usb, profile(1000, 5000, 50, 1500, 2400), PipelineTemplate::AgcClass),
    (RxMode::CwLower, profile(100, 3000, 10, -700, 1400), PipelineTemplate::AgcClass),
    (RxMode::CwUpper, profile(100, 3000, 10, 700, 1400), PipelineTemplate::AgcClass),
];

impl RxMode {
    pub const ALL: [RxMode; 7] = [
        RxMode::Am,
        RxMode::FmNarrow,
        RxMode::FmWide,
        RxMode::Lsb,
        RxMode::Usb,
        RxMode::CwLower,
        RxMode::CwUpper,
    ];

    pub fn from_index(idx: usize) -> RxResult<Self> {
        Self::ALL
            .get(idx)
            .copied()
            .ok_or_else(|| RxError::invalid_param(format!("unknown mode index {idx}")))
    }

    pub fn index(self) -> usize {
        match self {
            Self::Am => 0,
            Self::FmNarrow => 1,
            Self::FmWide => 2,
            Self::Lsb => 3,
            Self::Usb => 4,
            Self::CwLower => 5,
            Self::CwUpper => 6,
        }
    }

    pub fn profile(self) -> ModeProfile {
        MODE_TABLE[self.index()].1
    }

    pub fn template(self) -> PipelineTemplate {
        MODE_TABLE[self.index()].2
    }

    /// Wide FM runs the channelizer at a higher output rate than every other mode.
    pub fn is_wide(self) -> bool {
        matches!(self, Self::FmWide)
    }

    pub fn is_fm(self) -> bool {
        matches!(self.template(), PipelineTemplate::FmClass)
    }

    /// Channelizer output rate feeding the demodulator.
    pub fn demod_rate(self) -> u32 {
        if self.is_wide() {
            WIDE_DEMOD_RATE
        } else {
            NARROW_DEMOD_RATE
        }
    }

    /// Name used on the remote control protocol.
    pub fn protocol_name(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::FmNarrow => "FM",
            Self::FmWide => "WFM",
            Self::Lsb => "LSB",
            Self::Usb => "USB",
            Self::CwLower => "CWL",
            Self::CwUpper => "CWU",
        }
    }

    /// Short human label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::FmNarrow => "FM-N",
            Self::FmWide => "FM-W",
            Self::Lsb => "LSB",
            Self::Usb => "USB",
            Self::CwLower => "CW-L",
            Self::CwUpper => "CW-U",
        }
    }
}

impl fmt::Display for RxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RxMode {
    type Err = RxError;

    /// Accepts protocol names plus the hamlib aliases `CW` and `CWR`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "FM" | "FM-N" | "NFM" => Ok(Self::FmNarrow),
            "WFM" | "FM-W" | "WFM_ST" => Ok(Self::FmWide),
            "LSB" => Ok(Self::Lsb),
            "USB" => Ok(Self::Usb),
            "CWL" | "CWR" | "CW-L" => Ok(Self::CwLower),
            "CWU" | "CW" | "CW-U" => Ok(Self::CwUpper),
            other => Err(RxError::invalid_param(format!("unknown mode '{other}'"))),
        }
    }
}
