// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Demodulators: channel-filtered complex baseband to real audio at the
//! demodulator rate.

mod am;
mod fm;
mod ssb;

pub use am::{AmDemod, DcBlocker};
pub use fm::{Deemphasis, FmDemod};

use num_complex::Complex;
use rx_core::RxMode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemodKind {
    Am,
    Fm,
    Ssb,
}

/// Selects the demodulation algorithm for the channel.
pub enum Demodulator {
    /// Envelope detector with DC removal.
    Am(AmDemod),
    /// Quadrature discriminator plus optional de-emphasis.
    Fm(FmDemod),
    /// Real part of the filtered baseband. The band-pass picks the sideband,
    /// CW uses the same path with an offset passband.
    Ssb,
}

impl Demodulator {
    pub fn for_mode(mode: RxMode, rate: u32, fm_dev_hz: f32, deemph_us: f32) -> Self {
        match mode {
            RxMode::Am => Self::Am(AmDemod::new()),
            RxMode::FmNarrow | RxMode::FmWide => {
                Self::Fm(FmDemod::new(rate as f32, fm_dev_hz, deemph_us))
            }
            RxMode::Lsb | RxMode::Usb | RxMode::CwLower | RxMode::CwUpper => Self::Ssb,
        }
    }

    pub fn kind(&self) -> DemodKind {
        match self {
            Self::Am(_) => DemodKind::Am,
            Self::Fm(_) => DemodKind::Fm,
            Self::Ssb => DemodKind::Ssb,
        }
    }

    /// Live FM tweak; other demodulators ignore it.
    pub fn set_fm_params(&mut self, fm_dev_hz: f32, deemph_us: f32) {
        if let Self::Fm(fm) = self {
            fm.set_params(fm_dev_hz, deemph_us);
        }
    }

    pub fn process(&mut self, input: &[Complex<f32>], output: &mut Vec<f32>) {
        output.clear();
        match self {
            Self::Am(am) => am.process(input, output),
            Self::Fm(fm) => fm.process(input, output),
            Self::Ssb => ssb::demod_real(input, output),
        }
    }
}
