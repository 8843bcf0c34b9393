// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! DSP stages of the receive chain.

pub mod agc;
pub mod channel;
pub mod filter;
pub mod meter;
pub mod resampler;
pub mod spectrum;
pub mod squelch;

pub use agc::EnvelopeAgc;
pub use channel::Channelizer;
pub use filter::BlockFir;
pub use resampler::RationalResampler;
pub use spectrum::SpectrumSnapshotter;
pub use squelch::PowerSquelch;
