//! Structural control-flow representation of target callables.
//!
//! Target programs are data: statements and expressions form the tree the
//! instrumentor walks when deciding where probe emissions belong. Target code
//! contains no logging of its own -- observation is attached from outside.
//!
//! The `Display` impl on [`Expr`] renders an expression back to source text;
//! that rendering is what Branch and Await trace events carry as their
//! condition/expression text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Boolean negation.
    Not,
}

/// Binary operators: arithmetic, comparison, and short-circuit logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Source-text spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// An expression in a target callable's body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Variable reference by name.
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// List literal.
    List(Vec<Expr>),
    /// Call by local or dotted qualified name, positional arguments.
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    /// Asynchronous wait point. Awaiting a deferred value runs it; awaiting
    /// anything else passes the value through.
    Await(Box<Expr>),
    /// Cooperative-yield point. Only valid inside a generator body; the
    /// expression's value is whatever the consumer sends back in.
    Yield(Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn int(v: i64) -> Expr {
        Expr::Int(v)
    }

    pub fn str(s: impl Into<String>) -> Expr {
        Expr::Str(s.into())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: callee.into(),
            args,
        }
    }

    pub fn awaited(inner: Expr) -> Expr {
        Expr::Await(Box::new(inner))
    }

    pub fn yielded(inner: Expr) -> Expr {
        Expr::Yield(Box::new(inner))
    }

    /// `true` if this expression or any sub-expression is a yield point.
    pub fn contains_yield(&self) -> bool {
        match self {
            Expr::Yield(_) => true,
            Expr::Null
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Var(_) => false,
            Expr::Unary { operand, .. } => operand.contains_yield(),
            Expr::Binary { lhs, rhs, .. } => lhs.contains_yield() || rhs.contains_yield(),
            Expr::List(items) => items.iter().any(Expr::contains_yield),
            Expr::Call { args, .. } => args.iter().any(Expr::contains_yield),
            Expr::Await(inner) => inner.contains_yield(),
        }
    }

    /// `true` if this expression or any sub-expression is an await point.
    pub fn contains_await(&self) -> bool {
        match self {
            Expr::Await(_) => true,
            Expr::Null
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Var(_) => false,
            Expr::Unary { operand, .. } => operand.contains_await(),
            Expr::Binary { lhs, rhs, .. } => lhs.contains_await() || rhs.contains_await(),
            Expr::List(items) => items.iter().any(Expr::contains_await),
            Expr::Call { args, .. } => args.iter().any(Expr::contains_await),
            Expr::Yield(inner) => inner.contains_await(),
        }
    }
}

// Source-text rendering. Nested binary operands are parenthesized so the
// rendered text is unambiguous without tracking precedence.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Null => write!(f, "null"),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Float(v) => write!(f, "{:?}", v),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{}", Paren(operand)),
                UnaryOp::Not => write!(f, "not {}", Paren(operand)),
            },
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", Paren(lhs), op.symbol(), Paren(rhs))
            }
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Call { callee, args } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Await(inner) => write!(f, "await {}", Paren(inner)),
            Expr::Yield(inner) => write!(f, "yield {}", Paren(inner)),
        }
    }
}

/// Wraps compound sub-expressions in parentheses when rendered.
struct Paren<'e>(&'e Expr);

impl fmt::Display for Paren<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Binary { .. } | Expr::Unary { .. } | Expr::Await(_) | Expr::Yield(_) => {
                write!(f, "({})", self.0)
            }
            other => write!(f, "{}", other),
        }
    }
}

/// One catch clause of a `try` statement.
///
/// `tag: None` is a catch-all; otherwise the clause matches thrown exceptions
/// whose tag equals `tag`. The matching check itself is an exception-guard
/// trace point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// Exception tag to match; `None` matches everything.
    pub tag: Option<String>,
    /// Name the caught payload is bound to in the handler body.
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

/// A statement in a target callable's body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Introduce (or shadow) a variable.
    Let { name: String, value: Expr },
    /// Assign to an existing variable.
    Assign { name: String, value: Expr },
    /// Evaluate an expression for its effects, discarding the value.
    Expr(Expr),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// Iterate a list or drive a generator. There is no guard expression,
    /// so for-loops carry no branch trace point.
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    /// Raise an exception with a tag and payload value.
    Throw { tag: String, payload: Expr },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<CatchClause>,
    },
}

impl Stmt {
    /// `true` if this statement contains a yield point anywhere.
    ///
    /// A function whose body contains a yield is a generator.
    pub fn contains_yield(&self) -> bool {
        match self {
            Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
                value.contains_yield()
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                cond.contains_yield()
                    || then_body.iter().any(Stmt::contains_yield)
                    || else_body.iter().any(Stmt::contains_yield)
            }
            Stmt::While { cond, body } => {
                cond.contains_yield() || body.iter().any(Stmt::contains_yield)
            }
            Stmt::For { iter, body, .. } => {
                iter.contains_yield() || body.iter().any(Stmt::contains_yield)
            }
            Stmt::Return(value) => value.as_ref().is_some_and(Expr::contains_yield),
            Stmt::Throw { payload, .. } => payload.contains_yield(),
            Stmt::Try { body, handlers } => {
                body.iter().any(Stmt::contains_yield)
                    || handlers
                        .iter()
                        .any(|h| h.body.iter().any(Stmt::contains_yield))
            }
        }
    }
}
