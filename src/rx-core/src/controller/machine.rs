// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Run-state machine for the streaming pipeline.
//!
//! The stream thread and the control side share one machine behind the
//! pipeline's gate mutex. Pauses nest: every `PauseRequested` must be
//! matched by a `ResumeRequested` before samples flow again.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Events that can trigger run-state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Stream thread spawned.
    Started,
    /// Control side wants the stream thread parked.
    PauseRequested,
    /// Stream thread finished its block and is parked.
    Halted,
    /// Control side releases one pause level.
    ResumeRequested,
    /// Pipeline shut down.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "depth")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    /// Pause requested, the stream thread may still be inside a block.
    Pausing(u32),
    /// Stream thread parked; the graph may be mutated.
    Paused(u32),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Running => write!(f, "Running"),
            Self::Pausing(depth) => write!(f, "Pausing({depth})"),
            Self::Paused(depth) => write!(f, "Paused({depth})"),
        }
    }
}

impl RunState {
    /// No block is in flight and none will start.
    pub fn is_quiescent(&self) -> bool {
        matches!(self, Self::Stopped | Self::Paused(_))
    }

    /// The stream thread must not start another block.
    pub fn holds_stream(&self) -> bool {
        matches!(self, Self::Pausing(_) | Self::Paused(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn pause_depth(&self) -> u32 {
        match self {
            Self::Pausing(depth) | Self::Paused(depth) => *depth,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunStateMachine {
    state: RunState,
    transition_count: u64,
    last_transition: Option<Instant>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Stopped,
            transition_count: 0,
            last_transition: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn time_in_state(&self) -> Option<Duration> {
        self.last_transition.map(|t| t.elapsed())
    }

    /// Process an event and potentially transition to a new state.
    /// Returns true if a transition occurred.
    pub fn process_event(&mut self, event: RunEvent) -> bool {
        match self.next_state(event) {
            Some(state) => {
                self.state = state;
                self.transition_count += 1;
                self.last_transition = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    fn next_state(&self, event: RunEvent) -> Option<RunState> {
        match (self.state, event) {
            (RunState::Stopped, RunEvent::Started) => Some(RunState::Running),

            (RunState::Running, RunEvent::PauseRequested) => Some(RunState::Pausing(1)),
            (RunState::Pausing(depth), RunEvent::PauseRequested) => {
                Some(RunState::Pausing(depth + 1))
            }
            (RunState::Paused(depth), RunEvent::PauseRequested) => {
                Some(RunState::Paused(depth + 1))
            }

            (RunState::Pausing(depth), RunEvent::Halted) => Some(RunState::Paused(depth)),

            (RunState::Paused(1) | RunState::Pausing(1), RunEvent::ResumeRequested) => {
                Some(RunState::Running)
            }
            (RunState::Paused(depth), RunEvent::ResumeRequested) => {
                Some(RunState::Paused(depth - 1))
            }
            (RunState::Pausing(depth), RunEvent::ResumeRequested) => {
                Some(RunState::Pausing(depth - 1))
            }

            (RunState::Stopped, RunEvent::Stopped) => None,
            (_, RunEvent::Stopped) => Some(RunState::Stopped),

            // Pausing a stopped pipeline is trivially satisfied.
            _ => None,
        }
    }
}
