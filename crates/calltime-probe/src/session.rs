//! Enable gate and the probe callbacks run around every tracked call.

use crate::catalog::TargetId;
use crate::clock::now_ticks;
use crate::registry::{MethodRegistry, TrackedId};
use crate::stats::{StatSnapshot, StatsTable};
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Callbacks an instrumentation binder runs around a tracked call.
///
/// Exactly one of `on_exit` / `on_fault` must be called with the state
/// returned by `on_enter`. Implementations must not panic.
pub trait Probe: Send + Sync {
    fn on_enter(&self, target: TargetId) -> CallState;
    fn on_exit(&self, state: CallState);
    fn on_fault(&self, state: CallState);
}

/// Per-invocation measurement state, consumed exactly once
#[derive(Debug)]
#[must_use = "a CallState must be passed to on_exit or on_fault"]
pub struct CallState {
    id: TrackedId,
    generation: u64,
    start: i64,
    started: bool,
}

impl CallState {
    /// State for a call that is not being measured
    pub fn unstarted() -> Self {
        CallState {
            id: TrackedId(0),
            generation: 0,
            start: 0,
            started: false,
        }
    }

    fn started(id: TrackedId, generation: u64, start: i64) -> Self {
        CallState {
            id,
            generation,
            start,
            started: true,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn id(&self) -> Option<TrackedId> {
        self.started.then_some(self.id)
    }
}

/// Consumer of drained snapshots, e.g. a database writer
pub trait ReportSink: Send {
    fn publish(&mut self, snapshot: &StatSnapshot) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

impl<F> ReportSink for F
where
    F: FnMut(&StatSnapshot) + Send,
{
    fn publish(&mut self, snapshot: &StatSnapshot) -> Result<(), Box<dyn StdError + Send + Sync>> {
        self(snapshot);
        Ok(())
    }
}

/// Timing session: a single enabled flag plus the probe logic.
///
/// Starts disabled. While disabled, `on_enter` costs one atomic load.
pub struct TimingSession {
    enabled: AtomicBool,
    registry: Arc<MethodRegistry>,
    stats: StatsTable,
    sink: Mutex<Option<Box<dyn ReportSink>>>,
}

impl TimingSession {
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        let stats = registry.stats();
        TimingSession {
            enabled: AtomicBool::new(false),
            registry,
            stats,
            sink: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable timing. Returns false if it was already enabled.
    pub fn start(&self) -> bool {
        !self.enabled.swap(true, Ordering::AcqRel)
    }

    /// Disable timing and, if a sink is attached, drain to it before
    /// returning. Returns false if it was already disabled.
    pub fn stop(&self) -> bool {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return false;
        }
        let mut sink = self.sink.lock();
        if let Some(sink) = sink.as_mut() {
            publish(&mut **sink, &self.stats.drain());
        }
        true
    }

    /// Attach the consumer that receives drained snapshots
    pub fn set_sink(&self, sink: Box<dyn ReportSink>) {
        *self.sink.lock() = Some(sink);
    }

    /// Snapshot and reset the counters, publishing to the sink if attached
    pub fn drain(&self) -> StatSnapshot {
        let mut sink = self.sink.lock();
        let snapshot = self.stats.drain();
        if let Some(sink) = sink.as_mut() {
            publish(&mut **sink, &snapshot);
        }
        snapshot
    }

    /// Time the rest of the current scope against `target`
    pub fn scope(&self, target: TargetId) -> TimedScope<'_> {
        TimedScope {
            probe: self,
            state: Some(self.on_enter(target)),
        }
    }
}

impl Probe for TimingSession {
    #[inline]
    fn on_enter(&self, target: TargetId) -> CallState {
        if !self.is_enabled() {
            return CallState::unstarted();
        }
        let start = now_ticks();
        match self.registry.lookup(target) {
            Some((generation, id)) => CallState::started(id, generation, start),
            None => CallState::unstarted(),
        }
    }

    #[inline]
    fn on_exit(&self, state: CallState) {
        if state.started {
            let elapsed = now_ticks().saturating_sub(state.start);
            self.stats.record_in(state.generation, state.id, elapsed, false);
        }
    }

    #[inline]
    fn on_fault(&self, state: CallState) {
        if state.started {
            let elapsed = now_ticks().saturating_sub(state.start);
            self.stats.record_in(state.generation, state.id, elapsed, true);
        }
    }
}

fn publish(sink: &mut dyn ReportSink, snapshot: &StatSnapshot) {
    match sink.publish(snapshot) {
        Ok(()) => info!(
            functions = snapshot.len(),
            calls = snapshot.total_calls(),
            "drained call stats"
        ),
        Err(e) => warn!(error = %e, "report sink rejected snapshot"),
    }
}

/// Guard that finishes a measurement when dropped.
///
/// Dropping during a panic unwind records a fault; otherwise a normal exit.
pub struct TimedScope<'a> {
    probe: &'a dyn Probe,
    state: Option<CallState>,
}

impl<'a> TimedScope<'a> {
    pub fn new(probe: &'a dyn Probe, target: TargetId) -> Self {
        TimedScope {
            probe,
            state: Some(probe.on_enter(target)),
        }
    }

    pub fn is_started(&self) -> bool {
        self.state.as_ref().is_some_and(CallState::is_started)
    }

    /// End the scope as a fault, e.g. when the call returned an error
    pub fn fault(mut self) {
        if let Some(state) = self.state.take() {
            self.probe.on_fault(state);
        }
    }
}

impl Drop for TimedScope<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            if std::thread::panicking() {
                self.probe.on_fault(state);
            } else {
                self.probe.on_exit(state);
            }
        }
    }
}
