// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod controller;
pub mod radio;
pub mod rx;
pub mod stream;
pub mod telemetry;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use radio::filter::{FilterShape, FilterSpec};
pub use radio::freq::{Freq, FreqRange, GainRange};
pub use radio::gain::AgcSetting;
pub use radio::mode::{ModeProfile, PipelineTemplate, RxMode};
pub use rx::command::RxCommand;
pub use rx::error::{RxError, RxResult};
pub use rx::request::RxRequest;
pub use rx::state::{PipelineState, PlaybackStatus, RecordingStatus, RxSnapshot};
pub use telemetry::{TelemetryBus, TelemetryMessage};
