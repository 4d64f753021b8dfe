//! Core error types for xray-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Resolution
//! failures (`ModuleNotFound`, `FunctionNotFound`) are fatal to an observed
//! run: they are surfaced before any tracer is created.

use thiserror::Error;

/// Core errors produced by the xray-core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A qualified name did not resolve to any module.
    #[error("module not found: '{name}'")]
    ModuleNotFound { name: String },

    /// A qualified name did not resolve to any function.
    #[error("function not found: '{name}'")]
    FunctionNotFound { name: String },

    /// Registering a module name that already exists under its parent.
    #[error("duplicate module: '{name}'")]
    DuplicateModule { name: String },

    /// Registering a function name that already exists in its module.
    #[error("duplicate function: '{name}'")]
    DuplicateFunction { name: String },

    /// A qualified name that is empty or does not start at the program root.
    #[error("invalid path: '{path}'")]
    InvalidPath { path: String },
}
