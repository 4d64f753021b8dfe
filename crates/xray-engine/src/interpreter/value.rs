//! Runtime value representation for the evaluator.
//!
//! [`Value`] is the dynamic runtime counterpart of the target-program AST.
//! Generators and deferreds are first-class: calling a generator or async
//! function produces one of these suspended values with its arguments
//! already bound; driving or awaiting it later runs the body.

use serde::{Deserialize, Serialize};

/// A runtime value produced or consumed during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// A suspended generator: qualified function name plus bound arguments,
    /// in parameter order. Driven by `for` iteration.
    Generator(GeneratorValue),
    /// A suspended async computation, run when awaited.
    Deferred(DeferredValue),
}

/// A generator value awaiting its consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorValue {
    /// Qualified name of the generator function.
    pub function: String,
    /// Bound argument values in parameter order (defaults applied).
    pub args: Vec<Value>,
}

/// A deferred async computation awaiting an `await`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredValue {
    /// Qualified name of the async function.
    pub function: String,
    /// Bound argument values in parameter order (defaults applied).
    pub args: Vec<Value>,
}

impl Value {
    /// Returns a human-readable description of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::List(_) => "List",
            Value::Generator(_) => "Generator",
            Value::Deferred(_) => "Deferred",
        }
    }
}
