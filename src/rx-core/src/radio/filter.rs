// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filter shape and passband policy.

use serde::{Deserialize, Serialize};

use crate::rx::error::{RxError, RxResult};

/// Narrowest transition band handed to the filter designer (Hz).
pub const MIN_TRANSITION_HZ: i32 = 500;

/// Transition steepness selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterShape {
    Soft,
    #[default]
    Normal,
    Sharp,
}

impl FilterShape {
    pub fn from_index(idx: usize) -> RxResult<Self> {
        match idx {
            0 => Ok(Self::Soft),
            1 => Ok(Self::Normal),
            2 => Ok(Self::Sharp),
            _ => Err(RxError::invalid_param(format!(
                "unknown filter shape index {idx}"
            ))),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Soft => 0,
            Self::Normal => 1,
            Self::Sharp => 2,
        }
    }

    /// Transition width as a percentage of the passband width.
    pub fn percent(self) -> i32 {
        match self {
            Self::Soft => 40,
            Self::Normal => 25,
            Self::Sharp => 10,
        }
    }

    /// Transition width for a passband of `width` Hz, floor-clamped.
    pub fn transition_for(self, width: i32) -> i32 {
        (width * self.percent() / 100).max(MIN_TRANSITION_HZ)
    }
}

/// Passband edges relative to the channelizer tuning point.
///
/// Positive values are above the tuned frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub low: i32,
    pub high: i32,
    pub transition: i32,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            low: -5000,
            high: 5000,
            transition: 2000,
        }
    }
}

impl FilterSpec {
    pub fn from_center_width(center: i32, width: i32, shape: FilterShape) -> RxResult<Self> {
        if width <= 0 {
            return Err(RxError::invalid_param(format!(
                "filter width must be positive, got {width}"
            )));
        }
        let low = center - width / 2;
        Ok(Self {
            low,
            high: low + width,
            transition: shape.transition_for(width),
        })
    }

    pub fn width(&self) -> i32 {
        self.high - self.low
    }
}
