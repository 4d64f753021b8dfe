//! Function definitions for target callables.
//!
//! [`Function`] carries the full callable: name, parameters (optionally with
//! default-value expressions), body statements, and an async flag. Whether a
//! function is a generator is derived from its body (any yield point makes it
//! one), never declared.

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Stmt};

/// A single named parameter, optionally with a default-value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Evaluated at call time when the caller provides no value.
    pub default: Option<Expr>,
}

impl Param {
    /// A parameter the caller must always provide.
    pub fn required(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter with a default-value expression.
    pub fn with_default(name: impl Into<String>, default: Expr) -> Self {
        Param {
            name: name.into(),
            default: Some(default),
        }
    }
}

/// Full definition of a target callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name, unqualified. The qualified name is the owning module
    /// path joined with this name by dots.
    pub name: String,
    /// Named parameters in declaration order.
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Calling an async function produces a deferred value; awaiting the
    /// deferred runs the body.
    pub is_async: bool,
}

impl Function {
    /// Creates a synchronous function.
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        Function {
            name: name.into(),
            params,
            body,
            is_async: false,
        }
    }

    /// Creates an asynchronous function.
    pub fn new_async(name: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        Function {
            name: name.into(),
            params,
            body,
            is_async: true,
        }
    }

    /// `true` if the body contains a yield point anywhere.
    pub fn is_generator(&self) -> bool {
        self.body.iter().any(Stmt::contains_yield)
    }
}
