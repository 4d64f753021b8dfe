//! Target-program data model: modules, functions, statements, expressions.
//!
//! Target programs are plain data. The engine crate walks this model to
//! attach observation probes and execute it; nothing here knows about
//! tracing.

pub mod ast;
pub mod error;
pub mod function;
pub mod module;

// Re-export commonly used types
pub use ast::{BinaryOp, CatchClause, Expr, Stmt, UnaryOp};
pub use error::CoreError;
pub use function::{Function, Param};
pub use module::{Module, Program, Resolved};
