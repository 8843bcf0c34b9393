// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Streaming receive chain: IQ source, channelizer, demodulators and audio
//! outputs driven by one OS thread, plus the control surface that
//! reconfigures it.

pub mod demod;
pub mod dsp;
pub mod graph;
pub mod output;
pub mod pipeline;
pub mod receiver;
pub mod source;

pub use graph::{FlowGraph, LiveControls, SpectrumConfig, StageKind};
pub use output::{AudioSink, ChannelSink, NullSink};
pub use pipeline::Pipeline;
pub use receiver::{Receiver, ReceiverConfig};
pub use source::{IqSource, SyntheticSource, Tone};

/// Block size for IQ reads.
pub const IQ_BLOCK_SIZE: usize = 4096;
