// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver event notification system.
//!
//! Listeners get typed callbacks for the parts of [`PipelineState`] that
//! changed after a command was applied.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::radio::filter::FilterSpec;
use crate::radio::mode::RxMode;
use crate::rx::state::PipelineState;

use super::machine::RunState;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Trait for components that want to receive receiver events.
///
/// All methods have default no-op implementations.
pub trait RxListener: Send + Sync {
    /// Display frequency (hardware + offset + LNB LO) changed.
    fn on_frequency_change(&self, _old_hz: i64, _new_hz: i64) {}

    fn on_mode_change(&self, _old: RxMode, _new: RxMode) {}

    fn on_filter_change(&self, _filter: &FilterSpec) {}

    fn on_squelch_change(&self, _threshold_db: f64) {}

    /// `Some(path)` when a recording starts, `None` when it stops.
    fn on_recording_change(&self, _active: Option<&Path>) {}

    fn on_playback_change(&self, _active: Option<&Path>) {}

    fn on_run_state_change(&self, _old: RunState, _new: RunState) {}
}

/// Manages registered listeners and dispatches events.
pub struct RxEventEmitter {
    listeners: Vec<(ListenerId, Arc<dyn RxListener>)>,
}

impl Default for RxEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl RxEventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Arc<dyn RxListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Compare two states and notify listeners about every difference.
    pub fn notify_changes(&self, old: &PipelineState, new: &PipelineState) {
        if self.listeners.is_empty() {
            return;
        }
        let (old_hz, new_hz) = (old.display_freq_hz(), new.display_freq_hz());
        let mode_changed = old.mode != new.mode;
        let filter_changed = old.filter != new.filter;
        let squelch_changed = old.squelch_db != new.squelch_db;
        let recording_changed = old.recording.active != new.recording.active;
        let playback_changed = old.playback.file != new.playback.file;
        let run_changed = old.run_state != new.run_state;

        for (_, listener) in &self.listeners {
            if old_hz != new_hz {
                listener.on_frequency_change(old_hz, new_hz);
            }
            if mode_changed {
                listener.on_mode_change(old.mode, new.mode);
            }
            if filter_changed {
                listener.on_filter_change(&new.filter);
            }
            if squelch_changed {
                listener.on_squelch_change(new.squelch_db);
            }
            if recording_changed {
                listener.on_recording_change(new.recording.active.as_deref());
            }
            if playback_changed {
                listener.on_playback_change(new.playback.file.as_deref());
            }
            if run_changed {
                listener.on_run_state_change(old.run_state, new.run_state);
            }
        }
    }
}
