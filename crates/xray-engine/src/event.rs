//! Structured trace events emitted by instrumentation probes.
//!
//! [`TraceEvent`] is the unit of observation: one timestamped record per
//! probe emission. The serde representation uses a `type` discriminator so
//! `dump_json` output round-trips back into the same event sequence.
//!
//! Timestamps are elapsed seconds since the owning tracer's creation, and are
//! non-decreasing within one tracer's sequence (single logical writer).

use serde::{Deserialize, Serialize};

/// Which kind of guard a branch event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    /// An `if`-style conditional guard.
    Conditional,
    /// A `while`-style loop condition; one event per evaluation, including
    /// the final false check that ends the loop.
    LoopCondition,
    /// An exception-matching guard on a catch clause.
    ExceptGuard,
}

/// One structured, timestamped record of an execution-time occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TraceEvent {
    /// A callable was entered, after argument binding (defaults included).
    FunctionEntry {
        function: String,
        /// `(parameter name, stringified value)` pairs in declaration order.
        args: Vec<(String, String)>,
        timestamp: f64,
    },
    /// A callable returned. `return_value` is `None` when the callable
    /// produced no value (fell off the end or bare `return`).
    FunctionExit {
        function: String,
        return_value: Option<String>,
        timestamp: f64,
    },
    /// One evaluation of a conditional, loop, or exception guard.
    Branch {
        function: String,
        kind: BranchKind,
        /// Source text of the guard condition.
        condition: String,
        /// `(variable name, stringified value)` pairs referenced by the
        /// condition, captured at evaluation time.
        variables: Vec<(String, String)>,
        result: bool,
        timestamp: f64,
    },
    /// One asynchronous suspension-resumption cycle.
    Await {
        function: String,
        /// Source text of the awaited expression.
        expression: String,
        /// Stringified pre-suspension awaited value.
        awaited: String,
        /// Stringified post-resumption result.
        result: String,
        timestamp: f64,
    },
    /// Control left a generator at a yield point.
    Yield {
        function: String,
        value: String,
        timestamp: f64,
    },
    /// Control re-entered a suspended generator with a sent value.
    YieldResume {
        function: String,
        sent: String,
        timestamp: f64,
    },
}

impl TraceEvent {
    /// The qualified callable name this event belongs to.
    pub fn function(&self) -> &str {
        match self {
            TraceEvent::FunctionEntry { function, .. }
            | TraceEvent::FunctionExit { function, .. }
            | TraceEvent::Branch { function, .. }
            | TraceEvent::Await { function, .. }
            | TraceEvent::Yield { function, .. }
            | TraceEvent::YieldResume { function, .. } => function,
        }
    }

    /// Elapsed seconds since tracer creation.
    pub fn timestamp(&self) -> f64 {
        match self {
            TraceEvent::FunctionEntry { timestamp, .. }
            | TraceEvent::FunctionExit { timestamp, .. }
            | TraceEvent::Branch { timestamp, .. }
            | TraceEvent::Await { timestamp, .. }
            | TraceEvent::Yield { timestamp, .. }
            | TraceEvent::YieldResume { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the same event with its timestamp replaced. Used by tests
    /// that compare sequences modulo timing.
    pub fn with_timestamp(mut self, value: f64) -> Self {
        match &mut self {
            TraceEvent::FunctionEntry { timestamp, .. }
            | TraceEvent::FunctionExit { timestamp, .. }
            | TraceEvent::Branch { timestamp, .. }
            | TraceEvent::Await { timestamp, .. }
            | TraceEvent::Yield { timestamp, .. }
            | TraceEvent::YieldResume { timestamp, .. } => *timestamp = value,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_type_discriminator() {
        let event = TraceEvent::FunctionEntry {
            function: "app.add".into(),
            args: vec![("a".into(), "1".into()), ("b".into(), "2".into())],
            timestamp: 0.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FunctionEntry");
        assert_eq!(json["function"], "app.add");
        assert_eq!(json["args"][0][0], "a");
        assert_eq!(json["args"][0][1], "1");
    }

    #[test]
    fn exit_without_value_serializes_null() {
        let event = TraceEvent::FunctionExit {
            function: "app.noop".into(),
            return_value: None,
            timestamp: 0.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["return_value"].is_null());
    }

    #[test]
    fn serde_roundtrip_all_variants() {
        let events = vec![
            TraceEvent::FunctionEntry {
                function: "m.f".into(),
                args: vec![],
                timestamp: 0.0,
            },
            TraceEvent::Branch {
                function: "m.f".into(),
                kind: BranchKind::LoopCondition,
                condition: "i < n".into(),
                variables: vec![("i".into(), "0".into())],
                result: true,
                timestamp: 0.1,
            },
            TraceEvent::Await {
                function: "m.f".into(),
                expression: "fetch()".into(),
                awaited: "<deferred m.fetch>".into(),
                result: "\"ok\"".into(),
                timestamp: 0.2,
            },
            TraceEvent::Yield {
                function: "m.g".into(),
                value: "1".into(),
                timestamp: 0.3,
            },
            TraceEvent::YieldResume {
                function: "m.g".into(),
                sent: "null".into(),
                timestamp: 0.4,
            },
            TraceEvent::FunctionExit {
                function: "m.f".into(),
                return_value: Some("3".into()),
                timestamp: 0.5,
            },
        ];
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<TraceEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, events);
    }
}
