//! Concurrency-safe, append-only trace log.
//!
//! One [`Tracer`] is bound to exactly one observed run. The executing worker
//! is the only appender; the caller may snapshot from another thread at any
//! time, including while a background run is still going. A snapshot is a
//! point-in-time copy: it reflects every append that completed before the
//! call returned and never exposes a partial event.
//!
//! The tracer also owns the run outcome: once the run finishes, `result()`
//! yields the target's return value or its runtime failure. This is how
//! background-mode failures surface -- captured, never silently dropped.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::event::TraceEvent;
use crate::interpreter::{RuntimeError, Value};
use crate::report;

/// A cheap-clone handle to one run's event log.
#[derive(Clone, Debug)]
pub struct Tracer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Tracer creation time; event timestamps are seconds since this.
    epoch: Instant,
    events: Mutex<Vec<TraceEvent>>,
    /// `None` while the run is still executing.
    outcome: Mutex<Option<Result<Value, RuntimeError>>>,
}

impl Tracer {
    pub fn new() -> Self {
        Tracer {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                events: Mutex::new(Vec::new()),
                outcome: Mutex::new(None),
            }),
        }
    }

    /// Elapsed seconds since tracer creation, for event timestamps.
    pub fn elapsed(&self) -> f64 {
        self.inner.epoch.elapsed().as_secs_f64()
    }

    /// Appends one event. The event's position in the log is its sequence
    /// number; appends from the single run worker are serialized by the lock.
    pub fn append(&self, event: TraceEvent) {
        self.inner.events.lock().push(event);
    }

    /// Point-in-time, immutable copy of the event sequence. Never blocks
    /// waiting for the run to finish; never loses already-appended events.
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.inner.events.lock().clone()
    }

    /// Number of events appended so far.
    pub fn len(&self) -> usize {
        self.inner.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The run outcome: `None` while the target is still executing,
    /// otherwise the return value or the runtime failure.
    pub fn result(&self) -> Option<Result<Value, RuntimeError>> {
        self.inner.outcome.lock().clone()
    }

    /// Records the run outcome. Called exactly once by the executor when the
    /// run finishes.
    pub(crate) fn finish(&self, outcome: Result<Value, RuntimeError>) {
        *self.inner.outcome.lock() = Some(outcome);
    }

    /// Human-readable line-per-event listing of the current snapshot.
    pub fn format_traces(&self) -> String {
        report::format_events(&self.snapshot())
    }

    /// JSON array of event objects, round-trippable back into the same
    /// sequence via serde.
    pub fn dump_json(&self) -> String {
        report::dump_json(&self.snapshot())
    }

    /// Writes a self-contained HTML document embedding a flow-diagram
    /// description of the trace, rendered by an external diagram tool
    /// fetched at view time.
    pub fn dump_report_file(&self, path: &Path) -> std::io::Result<()> {
        report::write_report(&self.snapshot(), path)
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer::new()
    }
}
