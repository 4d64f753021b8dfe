//! Runtime error types with trap semantics for the evaluator.
//!
//! Each variant is a condition that halts the observed run. Uncaught target
//! exceptions travel as [`RuntimeError::Uncaught`] so try/catch statements
//! can intercept them before they reach the caller.

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Runtime errors produced while executing a target callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    #[error("unknown variable: '{name}'")]
    UnknownVariable { name: String },

    #[error("unknown function: '{name}'")]
    UnknownFunction { name: String },

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("divide by zero")]
    DivideByZero,

    #[error("missing argument '{param}' for '{function}'")]
    MissingArgument { function: String, param: String },

    #[error("unknown argument '{name}' for '{function}'")]
    UnknownArgument { function: String, name: String },

    #[error("argument '{name}' for '{function}' bound twice")]
    DuplicateArgument { function: String, name: String },

    #[error("'{function}' takes {expected} argument(s), got {got}")]
    TooManyArguments {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("call depth limit ({limit}) exceeded")]
    CallDepthExceeded { limit: usize },

    /// A thrown target exception that no catch clause matched.
    #[error("uncaught exception '{tag}'")]
    Uncaught { tag: String, payload: Value },

    #[error("yield outside a generator in '{function}'")]
    YieldOutsideGenerator { function: String },

    #[error("value of type {got} is not iterable")]
    NotIterable { got: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}
