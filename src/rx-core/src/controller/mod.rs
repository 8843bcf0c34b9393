// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver controller components: the pipeline run-state machine and the
//! change listeners fed by the receiver task.

pub mod events;
pub mod machine;

pub use events::{ListenerId, RxEventEmitter, RxListener};
pub use machine::{RunEvent, RunState, RunStateMachine};
