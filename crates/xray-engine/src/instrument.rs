//! Instrumentor: lowers target callables into their observed form.
//!
//! Lowering is a visitor over the target AST. Every callable -- eligible or
//! not -- is lowered to the same [`Op`] form so one evaluator executes
//! everything; eligibility only decides whether probes are attached:
//!
//! - entry/exit and suspension probes are function-level (the `traced` flag);
//! - each `if`/`while` guard and each catch clause gets a [`BranchProbe`]
//!   carrying the condition's source text and the variable names it reads.
//!
//! Probes never change what the code computes. When a construct cannot carry
//! a probe (a `for` loop has no guard expression; a guard containing a
//! suspension point cannot be wrapped without reordering suspension events),
//! the construct is lowered unchanged and the gap is recorded as an
//! [`InstrumentationSkip`] -- a partial gap never fails the run.

use tracing::debug;

use xray_core::{CatchClause, Expr, Function, Module, Param, Stmt};

use crate::event::BranchKind;
use crate::include::InclusionScope;

/// Probe metadata attached to one guard evaluation site.
#[derive(Debug, Clone)]
pub struct BranchProbe {
    pub kind: BranchKind,
    /// Rendered source text of the condition.
    pub source: String,
    /// Variable names the condition reads, in appearance order.
    pub vars: Vec<String>,
}

/// A guard expression, probed or plain.
#[derive(Debug, Clone)]
pub struct Guard {
    pub cond: Expr,
    pub probe: Option<BranchProbe>,
}

/// A lowered catch clause.
#[derive(Debug, Clone)]
pub struct Handler {
    pub tag: Option<String>,
    pub binding: Option<String>,
    pub probe: Option<BranchProbe>,
    pub body: Vec<Op>,
}

/// A lowered statement.
#[derive(Debug, Clone)]
pub enum Op {
    Let {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Discard(Expr),
    If {
        guard: Guard,
        then_body: Vec<Op>,
        else_body: Vec<Op>,
    },
    While {
        guard: Guard,
        body: Vec<Op>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Op>,
    },
    Return(Option<Expr>),
    Throw {
        tag: String,
        payload: Expr,
    },
    Try {
        body: Vec<Op>,
        handlers: Vec<Handler>,
    },
}

/// A construct the instrumentor left unprobed.
#[derive(Debug, Clone)]
pub struct InstrumentationSkip {
    pub construct: &'static str,
    pub detail: String,
}

/// A behavior-preserving rewrite of one callable, ready to execute.
///
/// Cached per run keyed by qualified name, so repeated calls within one run
/// reuse the same rewrite bound to the same tracer.
#[derive(Debug)]
pub struct InstrumentedFn {
    /// Fully qualified dotted name.
    pub qualified: String,
    /// Qualified path of the namespace local callee names resolve in.
    pub module: String,
    pub params: Vec<Param>,
    pub body: Vec<Op>,
    /// Whether probes emit events for this callable.
    pub traced: bool,
    pub is_generator: bool,
    pub is_async: bool,
    pub skips: Vec<InstrumentationSkip>,
}

/// Lowers callables according to an inclusion scope.
#[derive(Debug, Clone)]
pub struct Instrumentor {
    scope: InclusionScope,
}

impl Instrumentor {
    pub fn new(scope: InclusionScope) -> Self {
        Instrumentor { scope }
    }

    pub fn scope(&self) -> &InclusionScope {
        &self.scope
    }

    /// Lowers a function found at `qualified` inside module `module_path`.
    pub fn lower_function(
        &self,
        module_path: &str,
        qualified: &str,
        function: &Function,
    ) -> InstrumentedFn {
        let traced = self.scope.is_eligible(qualified);
        let mut lowerer = Lowerer::new(traced);
        let body = lowerer.lower_block(&function.body);
        self.log_skips(qualified, &lowerer.skips);
        InstrumentedFn {
            qualified: qualified.to_string(),
            module: module_path.to_string(),
            params: function.params.clone(),
            body,
            traced,
            is_generator: function.is_generator(),
            is_async: function.is_async,
            skips: lowerer.skips,
        }
    }

    /// Lowers a module's top-level body as a zero-argument callable named by
    /// the module's qualified path.
    pub fn lower_module_body(&self, qualified: &str, module: &Module) -> InstrumentedFn {
        let traced = self.scope.is_eligible(qualified);
        let mut lowerer = Lowerer::new(traced);
        let body = lowerer.lower_block(&module.body);
        self.log_skips(qualified, &lowerer.skips);
        InstrumentedFn {
            qualified: qualified.to_string(),
            module: qualified.to_string(),
            params: Vec::new(),
            body,
            traced,
            is_generator: false,
            is_async: false,
            skips: lowerer.skips,
        }
    }

    fn log_skips(&self, qualified: &str, skips: &[InstrumentationSkip]) {
        for skip in skips {
            debug!(
                callable = qualified,
                construct = skip.construct,
                "instrumentation skipped: {}",
                skip.detail
            );
        }
    }
}

/// One lowering pass over a callable body.
struct Lowerer {
    traced: bool,
    skips: Vec<InstrumentationSkip>,
}

impl Lowerer {
    fn new(traced: bool) -> Self {
        Lowerer {
            traced,
            skips: Vec::new(),
        }
    }

    fn lower_block(&mut self, stmts: &[Stmt]) -> Vec<Op> {
        stmts.iter().map(|s| self.lower_stmt(s)).collect()
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Op {
        match stmt {
            Stmt::Let { name, value } => Op::Let {
                name: name.clone(),
                value: value.clone(),
            },
            Stmt::Assign { name, value } => Op::Assign {
                name: name.clone(),
                value: value.clone(),
            },
            Stmt::Expr(value) => Op::Discard(value.clone()),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => Op::If {
                guard: self.make_guard(cond, BranchKind::Conditional),
                then_body: self.lower_block(then_body),
                else_body: self.lower_block(else_body),
            },
            Stmt::While { cond, body } => Op::While {
                guard: self.make_guard(cond, BranchKind::LoopCondition),
                body: self.lower_block(body),
            },
            Stmt::For { var, iter, body } => {
                if self.traced {
                    self.skips.push(InstrumentationSkip {
                        construct: "for",
                        detail: format!(
                            "for-loop over '{iter}' has no guard expression to probe"
                        ),
                    });
                }
                Op::For {
                    var: var.clone(),
                    iter: iter.clone(),
                    body: self.lower_block(body),
                }
            }
            Stmt::Return(value) => Op::Return(value.clone()),
            Stmt::Throw { tag, payload } => Op::Throw {
                tag: tag.clone(),
                payload: payload.clone(),
            },
            Stmt::Try { body, handlers } => Op::Try {
                body: self.lower_block(body),
                handlers: handlers.iter().map(|h| self.lower_handler(h)).collect(),
            },
        }
    }

    fn lower_handler(&mut self, handler: &CatchClause) -> Handler {
        let probe = self.traced.then(|| BranchProbe {
            kind: BranchKind::ExceptGuard,
            source: handler.tag.clone().unwrap_or_else(|| "*".to_string()),
            vars: Vec::new(),
        });
        Handler {
            tag: handler.tag.clone(),
            binding: handler.binding.clone(),
            probe,
            body: self.lower_block(&handler.body),
        }
    }

    fn make_guard(&mut self, cond: &Expr, kind: BranchKind) -> Guard {
        if !self.traced {
            return Guard {
                cond: cond.clone(),
                probe: None,
            };
        }
        // Wrapping a suspension point in a branch probe would interleave the
        // branch event with the suspension's own events out of order; leave
        // such guards unprobed.
        if cond.contains_await() || cond.contains_yield() {
            self.skips.push(InstrumentationSkip {
                construct: "guard",
                detail: format!("guard '{cond}' contains a suspension point"),
            });
            return Guard {
                cond: cond.clone(),
                probe: None,
            };
        }
        Guard {
            cond: cond.clone(),
            probe: Some(BranchProbe {
                kind,
                source: cond.to_string(),
                vars: condition_vars(cond),
            }),
        }
    }
}

/// Variable names an expression reads, in appearance order, deduplicated.
fn condition_vars(expr: &Expr) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars(expr, &mut vars);
    vars
}

fn collect_vars(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Var(name) => {
            if !out.iter().any(|v| v == name) {
                out.push(name.clone());
            }
        }
        Expr::Null
        | Expr::Bool(_)
        | Expr::Int(_)
        | Expr::Float(_)
        | Expr::Str(_) => {}
        Expr::Unary { operand, .. } => collect_vars(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_vars(lhs, out);
            collect_vars(rhs, out);
        }
        Expr::List(items) => {
            for item in items {
                collect_vars(item, out);
            }
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_vars(arg, out);
            }
        }
        Expr::Await(inner) | Expr::Yield(inner) => collect_vars(inner, out),
    }
}
