//! Engine-level error type.
//!
//! Separates failures of the engine itself (bad target path, spawn failure)
//! from failures of the observed program, which arrive as
//! [`RuntimeError`](crate::interpreter::RuntimeError) and pass through
//! unchanged.

use xray_core::CoreError;

use crate::interpreter::RuntimeError;

/// Errors surfaced by the executor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    /// The entry-point name did not resolve.
    #[error(transparent)]
    Resolution(#[from] CoreError),

    /// Function execution was requested for a module path.
    #[error("'{name}' is not a function")]
    NotAFunction { name: String },

    /// Module execution was requested for a function path.
    #[error("'{name}' is not a module")]
    NotAModule { name: String },

    /// The observed program failed at runtime.
    #[error(transparent)]
    Target(#[from] RuntimeError),

    /// The background worker thread could not be started.
    #[error("failed to start background run: {message}")]
    Spawn { message: String },
}
