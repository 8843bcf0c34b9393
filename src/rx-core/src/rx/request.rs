// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tokio::sync::oneshot;

use crate::{RxCommand, RxResult, RxSnapshot};

/// Request sent to the receiver task.
#[derive(Debug)]
pub struct RxRequest {
    pub cmd: RxCommand,
    pub respond_to: oneshot::Sender<RxResult<RxSnapshot>>,
}

impl RxRequest {
    pub fn new(cmd: RxCommand) -> (Self, oneshot::Receiver<RxResult<RxSnapshot>>) {
        let (respond_to, rx) = oneshot::channel();
        (Self { cmd, respond_to }, rx)
    }
}
