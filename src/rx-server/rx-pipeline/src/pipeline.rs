// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stream thread and its pause gate.
//!
//! The thread reads one block, runs it through the graph and checks the gate
//! before starting the next one. `pause()` returns only once the thread is
//! parked at the gate, so a paused graph can be rewired without any block in
//! flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use num_complex::Complex;
use rx_core::controller::{RunEvent, RunState, RunStateMachine};
use rx_core::{RxError, RxResult};
use tracing::{debug, info, warn};

use crate::graph::{FlowGraph, LiveControls};
use crate::source::IqSource;
use crate::IQ_BLOCK_SIZE;

/// How often a waiting `pause()` re-checks that the stream thread is alive.
const PAUSE_POLL: Duration = Duration::from_millis(50);
/// A free-running source that falls this far behind resyncs instead of bursting.
const MAX_LAG: Duration = Duration::from_secs(1);

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    graph: Mutex<FlowGraph>,
    source: Mutex<Box<dyn IqSource>>,
    gate: Mutex<RunStateMachine>,
    gate_changed: Condvar,
    shutdown: AtomicBool,
    alive: AtomicBool,
}

/// Handle to the running stream thread. Dropping it stops and joins the
/// thread.
pub struct Pipeline {
    shared: Arc<Shared>,
    live: Arc<LiveControls>,
    handle: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn start(source: Box<dyn IqSource>, graph: FlowGraph) -> RxResult<Self> {
        let live = graph.live().clone();
        let shared = Arc::new(Shared {
            graph: Mutex::new(graph),
            source: Mutex::new(source),
            gate: Mutex::new(RunStateMachine::new()),
            gate_changed: Condvar::new(),
            shutdown: AtomicBool::new(false),
            alive: AtomicBool::new(true),
        });
        lock(&shared.gate).process_event(RunEvent::Started);

        let thread_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("rx-stream".to_string())
            .spawn(move || stream_loop(&thread_shared))
            .map_err(|e| RxError::io(format!("failed to spawn rx-stream thread: {e}")))?;
        info!("Stream thread started");

        Ok(Self {
            shared,
            live,
            handle: Some(handle),
        })
    }

    pub fn run_state(&self) -> RunState {
        lock(&self.shared.gate).state()
    }

    pub fn live(&self) -> &Arc<LiveControls> {
        &self.live
    }

    pub fn blocks_processed(&self) -> u64 {
        lock(&self.shared.graph).blocks_processed()
    }

    /// Park the stream thread. Returns once no block is in flight.
    /// Pauses nest; each needs its own `resume()`.
    pub fn pause(&self) {
        let mut gate = lock(&self.shared.gate);
        gate.process_event(RunEvent::PauseRequested);
        while matches!(gate.state(), RunState::Pausing(_)) {
            if !self.shared.alive.load(Ordering::Acquire) {
                // No thread left to acknowledge.
                gate.process_event(RunEvent::Halted);
                break;
            }
            gate = self
                .shared
                .gate_changed
                .wait_timeout(gate, PAUSE_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn resume(&self) {
        let mut gate = lock(&self.shared.gate);
        if gate.process_event(RunEvent::ResumeRequested) {
            self.shared.gate_changed.notify_all();
        }
    }

    /// Pause, mutate graph and source, resume. The resume happens even when
    /// the mutator fails.
    pub fn reconfigure<T>(
        &self,
        mutator: impl FnOnce(&mut FlowGraph, &mut dyn IqSource) -> RxResult<T>,
    ) -> RxResult<T> {
        self.pause();
        let result = {
            let mut source = lock(&self.shared.source);
            let mut graph = lock(&self.shared.graph);
            mutator(&mut graph, source.as_mut())
        };
        self.resume();
        result
    }

    /// Mutate the graph between two blocks without pausing.
    pub fn update<T>(&self, mutator: impl FnOnce(&mut FlowGraph) -> T) -> T {
        let mut graph = lock(&self.shared.graph);
        mutator(&mut graph)
    }

    /// Live device call; errors surface as device rejections.
    pub fn with_source<T>(
        &self,
        call: impl FnOnce(&mut dyn IqSource) -> Result<T, String>,
    ) -> RxResult<T> {
        let mut source = lock(&self.shared.source);
        call(source.as_mut()).map_err(RxError::device_rejected)
    }

    fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        {
            let mut gate = lock(&self.shared.gate);
            gate.process_event(RunEvent::Stopped);
            self.shared.gate_changed.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Stream thread panicked");
            }
            info!("Stream thread stopped");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the thread dead on every exit path, panics included.
struct AliveGuard<'a>(&'a Shared);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.alive.store(false, Ordering::Release);
        self.0.gate_changed.notify_all();
    }
}

/// Block at the gate until running. `None` means shut down; `Some(true)`
/// means the thread was parked on the way.
fn wait_until_running(shared: &Shared) -> Option<bool> {
    let mut gate = lock(&shared.gate);
    let mut parked = false;
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return None;
        }
        match gate.state() {
            RunState::Running => return Some(parked),
            RunState::Stopped => return None,
            RunState::Pausing(_) => {
                gate.process_event(RunEvent::Halted);
                shared.gate_changed.notify_all();
                debug!("Stream thread parked");
                parked = true;
            }
            RunState::Paused(_) => parked = true,
        }
        gate = shared
            .gate_changed
            .wait(gate)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn stream_loop(shared: &Shared) {
    let _alive = AliveGuard(shared);
    let mut block = vec![Complex::new(0.0_f32, 0.0_f32); IQ_BLOCK_SIZE];
    let mut deadline: Option<Instant> = None;

    loop {
        match wait_until_running(shared) {
            None => break,
            Some(true) => deadline = None,
            Some(false) => {}
        }

        let (read, paced) = {
            let mut source = lock(&shared.source);
            (source.read_into(&mut block), source.is_paced())
        };
        let n = match read {
            Ok(0) => {
                // Treat as transient and back off.
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }
            Ok(n) => n.min(block.len()),
            Err(e) => {
                warn!("IQ source read error: {}; retrying", e);
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let rate = {
            let mut graph = lock(&shared.graph);
            graph.process_block(&block[..n]);
            graph.sample_rate()
        };

        if !paced {
            let now = Instant::now();
            let due = deadline.unwrap_or(now)
                + Duration::from_secs_f64(n as f64 / rate.max(1) as f64);
            if due > now {
                std::thread::sleep(due - now);
                deadline = Some(due);
            } else if now - due > MAX_LAG {
                deadline = Some(now);
            } else {
                deadline = Some(due);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NullSink;
    use crate::source::SyntheticSource;
    use rx_core::{FreqRange, GainRange, PipelineState};

    fn ranges() -> (FreqRange, GainRange) {
        (
            FreqRange {
                min_hz: 100_000_000,
                max_hz: 200_000_000,
            },
            GainRange {
                min_db: 0.0,
                max_db: 40.0,
            },
        )
    }

    fn start() -> Pipeline {
        let (freq, gain) = ranges();
        let state = PipelineState::new(freq, gain, 250_000, 44_100).unwrap();
        let live = Arc::new(LiveControls::from_state(&state));
        let graph = FlowGraph::new(&state, Box::new(NullSink), live, None, None).unwrap();
        let source = SyntheticSource::new(freq, gain, 250_000).with_noise(0.01);
        Pipeline::start(Box::new(source), graph).unwrap()
    }

    fn wait_for_blocks(pipeline: &Pipeline, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.blocks_processed() < count {
            assert!(Instant::now() < deadline, "stream thread stalled");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_pause_is_synchronous() {
        let pipeline = start();
        wait_for_blocks(&pipeline, 2);

        pipeline.pause();
        assert_eq!(pipeline.run_state(), RunState::Paused(1));
        let parked_at = pipeline.blocks_processed();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(pipeline.blocks_processed(), parked_at);

        pipeline.resume();
        assert_eq!(pipeline.run_state(), RunState::Running);
        wait_for_blocks(&pipeline, parked_at + 2);
    }

    #[test]
    fn test_nested_pauses() {
        let pipeline = start();
        pipeline.pause();
        pipeline.pause();
        assert_eq!(pipeline.run_state(), RunState::Paused(2));
        pipeline.resume();
        assert_eq!(pipeline.run_state(), RunState::Paused(1));
        pipeline.resume();
        assert_eq!(pipeline.run_state(), RunState::Running);
    }

    #[test]
    fn test_reconfigure_runs_parked_and_resumes_on_error() {
        let pipeline = start();
        wait_for_blocks(&pipeline, 1);

        let seen = pipeline
            .reconfigure(|graph, _source| Ok(graph.blocks_processed()))
            .unwrap();
        assert!(seen >= 1);

        let err = pipeline
            .reconfigure(|_graph, source| {
                source
                    .set_center_freq(1)
                    .map_err(RxError::device_rejected)
            })
            .unwrap_err();
        assert!(matches!(err, RxError::DeviceRejected(_)));
        assert_eq!(pipeline.run_state(), RunState::Running);
    }

    #[test]
    fn test_live_update_and_source_calls() {
        let pipeline = start();
        pipeline.update(|graph| graph.set_offset(12_000));
        assert_eq!(pipeline.update(|graph| graph.tuning_offset()), 12_000);

        assert!(pipeline.with_source(|s| s.set_gain(10.0)).is_ok());
        let err = pipeline.with_source(|s| s.set_gain(99.0)).unwrap_err();
        assert!(matches!(err, RxError::DeviceRejected(_)));
    }

    #[test]
    fn test_meter_reads_live_level() {
        let pipeline = start();
        wait_for_blocks(&pipeline, 3);
        let dbfs = pipeline.live().signal_dbfs();
        assert!(dbfs > -150.0 && dbfs < -20.0, "dbfs {dbfs}");
    }

    #[test]
    fn test_drop_joins_paused_thread() {
        let pipeline = start();
        pipeline.pause();
        drop(pipeline);
    }
}
