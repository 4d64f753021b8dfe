//! Execution-observation engine for target programs.
//!
//! The engine runs a target program (an [`xray_core::Program`]) while
//! recording a structured trace of what happened inside it, without changing
//! what it computes. The pipeline:
//!
//! 1. [`include::InclusionScope`] decides which qualified names are eligible
//!    for observation (the target's root namespace plus extra prefixes).
//! 2. [`instrument::Instrumentor`] lowers each callable once per run,
//!    attaching probes to eligible code and recording skips where a
//!    construct cannot carry one.
//! 3. [`interpreter::Interpreter`] executes lowered bodies; probes append
//!    [`event::TraceEvent`]s to the run's [`tracer::Tracer`].
//! 4. [`executor::Executor`] orchestrates runs, synchronous or on a
//!    background thread, one fresh tracer per run.
//! 5. [`report`] renders a trace as text lines, JSON, or an HTML
//!    flow-diagram report.

pub mod error;
pub mod event;
pub mod executor;
pub mod include;
pub mod instrument;
pub mod interpreter;
pub mod report;
pub mod stringify;
pub mod tracer;

pub use error::ExecError;
pub use event::{BranchKind, TraceEvent};
pub use executor::{Args, Executor};
pub use include::InclusionScope;
pub use instrument::{InstrumentationSkip, Instrumentor};
pub use interpreter::{EngineConfig, RuntimeError, Value};
pub use tracer::Tracer;
