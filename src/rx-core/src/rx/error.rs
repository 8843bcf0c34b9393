// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;
use thiserror::Error;

/// Error type returned by receiver control operations.
///
/// A failed operation never leaves a partially applied change behind, so
/// every variant means "nothing happened".
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RxError {
    /// Out-of-table sample rate, unknown mode/shape/AGC index, width out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The sample source refused a frequency, gain or rate.
    #[error("device rejected request: {0}")]
    DeviceRejected(String),

    /// Recording/playback/capture state does not allow the operation.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("i/o error: {0}")]
    Io(String),
}

pub type RxResult<T> = Result<T, RxError>;

impl RxError {
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn device_rejected(msg: impl Into<String>) -> Self {
        Self::DeviceRejected(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::DeviceRejected(_) => "device_rejected",
            Self::Precondition(_) => "precondition",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for RxError {
    fn from(value: std::io::Error) -> Self {
        RxError::Io(value.to_string())
    }
}
