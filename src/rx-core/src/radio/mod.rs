// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod filter;
pub mod freq;
pub mod gain;
pub mod mode;
pub mod rates;

pub use freq::{Freq, FreqRange, GainRange};
