//! Run orchestration: entry-point validation, argument packaging, and the
//! sync/background execution modes.
//!
//! Every run gets a fresh [`Tracer`]; events from different runs never mix.
//! A synchronous run blocks until the target finishes and returns its value
//! with the completed trace. A background run returns the live tracer
//! immediately: the caller snapshots it while the worker thread executes,
//! and the worker parks the outcome in the tracer when it finishes, so a
//! background failure is captured rather than lost with the thread.

use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use xray_core::{Program, Resolved};

use crate::error::ExecError;
use crate::include::InclusionScope;
use crate::instrument::Instrumentor;
use crate::interpreter::{EngineConfig, Interpreter, RuntimeError, Value};
use crate::tracer::Tracer;

/// Call arguments for a function run: positional values plus named values
/// matched against parameter names.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Args::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Appends a named argument.
    pub fn named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.push((name.into(), value));
        self
    }
}

enum EntryPoint {
    Function(Args),
    Module,
}

/// Executes entry points of one target program.
pub struct Executor {
    program: Arc<Program>,
    scope: InclusionScope,
    config: EngineConfig,
}

impl Executor {
    /// Creates an executor whose inclusion scope is the program's root
    /// namespace.
    pub fn new(program: Program) -> Self {
        let scope = InclusionScope::new(program.root().name.clone());
        Executor {
            program: Arc::new(program),
            scope,
            config: EngineConfig::default(),
        }
    }

    /// Widens the inclusion scope with an extra namespace prefix.
    pub fn include_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope.include(scope);
        self
    }

    /// Replaces the inclusion scope entirely.
    pub fn with_scope(mut self, scope: InclusionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Runs a function to completion and returns its value with the trace.
    pub fn execute_function(
        &self,
        qualified: &str,
        args: Args,
    ) -> Result<(Value, Tracer), ExecError> {
        self.check_function(qualified)?;
        self.run_sync(qualified, EntryPoint::Function(args))
    }

    /// Runs a module's top-level body to completion.
    pub fn execute_module(&self, qualified: &str) -> Result<(Value, Tracer), ExecError> {
        self.check_module(qualified)?;
        self.run_sync(qualified, EntryPoint::Module)
    }

    /// Starts a function run on a worker thread and returns its live tracer.
    ///
    /// The tracer's `result()` stays `None` until the run finishes; a failing
    /// run parks its error there instead of surfacing through this call.
    pub fn execute_function_background(
        &self,
        qualified: &str,
        args: Args,
    ) -> Result<Tracer, ExecError> {
        self.check_function(qualified)?;
        self.run_background(qualified.to_string(), EntryPoint::Function(args))
    }

    /// Starts a module run on a worker thread and returns its live tracer.
    pub fn execute_module_background(&self, qualified: &str) -> Result<Tracer, ExecError> {
        self.check_module(qualified)?;
        self.run_background(qualified.to_string(), EntryPoint::Module)
    }

    fn check_function(&self, qualified: &str) -> Result<(), ExecError> {
        match self.program.resolve(qualified)? {
            Resolved::Function { .. } => Ok(()),
            Resolved::Module { .. } => Err(ExecError::NotAFunction {
                name: qualified.to_string(),
            }),
        }
    }

    fn check_module(&self, qualified: &str) -> Result<(), ExecError> {
        match self.program.resolve(qualified)? {
            Resolved::Module { .. } => Ok(()),
            Resolved::Function { .. } => Err(ExecError::NotAModule {
                name: qualified.to_string(),
            }),
        }
    }

    fn run_sync(
        &self,
        qualified: &str,
        entry: EntryPoint,
    ) -> Result<(Value, Tracer), ExecError> {
        debug!(run = %qualified, "starting synchronous run");
        let tracer = Tracer::new();
        let outcome = run_entry(
            &self.program,
            self.scope.clone(),
            self.config.clone(),
            &tracer,
            qualified,
            entry,
        );
        tracer.finish(outcome.clone());
        match outcome {
            Ok(value) => Ok((value, tracer)),
            Err(error) => Err(ExecError::Target(error)),
        }
    }

    fn run_background(
        &self,
        qualified: String,
        entry: EntryPoint,
    ) -> Result<Tracer, ExecError> {
        debug!(run = %qualified, "starting background run");
        let tracer = Tracer::new();
        let worker_tracer = tracer.clone();
        let program = Arc::clone(&self.program);
        let scope = self.scope.clone();
        let config = self.config.clone();
        thread::Builder::new()
            .name(format!("run-{qualified}"))
            .spawn(move || {
                let outcome = run_entry(&program, scope, config, &worker_tracer, &qualified, entry);
                if let Err(error) = &outcome {
                    warn!(run = %qualified, %error, "background run failed");
                }
                worker_tracer.finish(outcome);
            })
            .map_err(|e| ExecError::Spawn {
                message: e.to_string(),
            })?;
        Ok(tracer)
    }
}

fn run_entry(
    program: &Program,
    scope: InclusionScope,
    config: EngineConfig,
    tracer: &Tracer,
    qualified: &str,
    entry: EntryPoint,
) -> Result<Value, RuntimeError> {
    let interpreter = Interpreter::new(program, Instrumentor::new(scope), tracer.clone(), config);
    match entry {
        EntryPoint::Function(args) => {
            interpreter.run_function(qualified, args.positional, &args.named)
        }
        EntryPoint::Module => interpreter.run_module(qualified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceEvent;
    use proptest::prelude::*;
    use std::time::Duration;
    use xray_core::{BinaryOp, CoreError, Expr, Function, Module, Param, Stmt};

    fn math_program() -> Program {
        let mut root = Module::new("app");
        root.add_function(Function::new(
            "add",
            vec![Param::required("a"), Param::required("b")],
            vec![Stmt::Return(Some(Expr::binary(
                BinaryOp::Add,
                Expr::var("a"),
                Expr::var("b"),
            )))],
        ))
        .unwrap();
        root.add_function(Function::new(
            "count",
            vec![Param::required("limit")],
            vec![
                Stmt::Let {
                    name: "i".into(),
                    value: Expr::int(0),
                },
                Stmt::While {
                    cond: Expr::binary(BinaryOp::Lt, Expr::var("i"), Expr::var("limit")),
                    body: vec![Stmt::Assign {
                        name: "i".into(),
                        value: Expr::binary(BinaryOp::Add, Expr::var("i"), Expr::int(1)),
                    }],
                },
                Stmt::Return(Some(Expr::var("i"))),
            ],
        ))
        .unwrap();
        Program::new(root)
    }

    #[test]
    fn sync_function_run_returns_value_and_trace() {
        let executor = Executor::new(math_program());
        let (value, tracer) = executor
            .execute_function(
                "app.add",
                Args::new().arg(Value::Int(1)).arg(Value::Int(2)),
            )
            .unwrap();
        assert_eq!(value, Value::Int(3));
        assert_eq!(tracer.result(), Some(Ok(Value::Int(3))));

        let flattened: Vec<TraceEvent> = tracer
            .snapshot()
            .into_iter()
            .map(|e| e.with_timestamp(0.0))
            .collect();
        assert_eq!(
            flattened,
            vec![
                TraceEvent::FunctionEntry {
                    function: "app.add".into(),
                    args: vec![("a".into(), "1".into()), ("b".into(), "2".into())],
                    timestamp: 0.0,
                },
                TraceEvent::FunctionExit {
                    function: "app.add".into(),
                    return_value: Some("3".into()),
                    timestamp: 0.0,
                },
            ]
        );
    }

    #[test]
    fn named_arguments_reach_the_target() {
        let executor = Executor::new(math_program());
        let (value, _) = executor
            .execute_function(
                "app.add",
                Args::new().arg(Value::Int(5)).named("b", Value::Int(7)),
            )
            .unwrap();
        assert_eq!(value, Value::Int(12));
    }

    #[test]
    fn module_run_executes_top_level_body() {
        let mut root = Module::new("app");
        root.add_function(Function::new(
            "init",
            vec![],
            vec![Stmt::Return(Some(Expr::int(1)))],
        ))
        .unwrap();
        root.set_body(vec![Stmt::Expr(Expr::call("init", vec![]))]);
        let executor = Executor::new(Program::new(root));
        let (value, tracer) = executor.execute_module("app").unwrap();
        assert_eq!(value, Value::Null);
        let names: Vec<String> = tracer
            .snapshot()
            .iter()
            .map(|e| e.function().to_string())
            .collect();
        assert_eq!(names, vec!["app", "app.init", "app.init", "app"]);
    }

    #[test]
    fn entry_point_kind_is_validated() {
        let mut root = Module::new("app");
        root.add_child(Module::new("inner")).unwrap();
        root.add_function(Function::new("f", vec![], vec![])).unwrap();
        let executor = Executor::new(Program::new(root));

        assert!(matches!(
            executor.execute_function("app.inner", Args::new()),
            Err(ExecError::NotAFunction { .. })
        ));
        assert!(matches!(
            executor.execute_module("app.f"),
            Err(ExecError::NotAModule { .. })
        ));
        assert!(matches!(
            executor.execute_function("app.missing", Args::new()),
            Err(ExecError::Resolution(CoreError::FunctionNotFound { .. }))
        ));
    }

    #[test]
    fn sync_target_failure_propagates() {
        let executor = Executor::new(math_program());
        let err = executor
            .execute_function("app.add", Args::new().arg(Value::Int(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            ExecError::Target(RuntimeError::MissingArgument { .. })
        ));
    }

    #[test]
    fn background_run_exposes_growing_snapshots() {
        let mut root = Module::new("app");
        root.add_function(Function::new(
            "tick_forever",
            vec![],
            vec![Stmt::While {
                cond: Expr::Bool(true),
                body: vec![Stmt::Expr(Expr::call("sleep_ms", vec![Expr::int(2)]))],
            }],
        ))
        .unwrap();
        let executor = Executor::new(Program::new(root));
        let tracer = executor
            .execute_function_background("app.tick_forever", Args::new())
            .unwrap();

        // Still running: no outcome yet, but events keep arriving.
        let mut seen = 0;
        for _ in 0..500 {
            let len = tracer.len();
            if len >= 5 {
                seen = len;
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(seen >= 5, "background run produced no events");
        assert!(tracer.result().is_none());

        let earlier = tracer.snapshot();
        thread::sleep(Duration::from_millis(10));
        assert!(tracer.len() >= earlier.len());
    }

    #[test]
    fn background_failure_is_parked_in_the_tracer() {
        let mut root = Module::new("app");
        root.add_function(Function::new(
            "boom",
            vec![],
            vec![Stmt::Throw {
                tag: "Boom".into(),
                payload: Expr::int(1),
            }],
        ))
        .unwrap();
        let executor = Executor::new(Program::new(root));
        let tracer = executor
            .execute_function_background("app.boom", Args::new())
            .unwrap();

        let mut outcome = None;
        for _ in 0..500 {
            if let Some(result) = tracer.result() {
                outcome = Some(result);
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(
            outcome,
            Some(Err(RuntimeError::Uncaught {
                tag: "Boom".into(),
                payload: Value::Int(1),
            }))
        );
    }

    #[test]
    fn background_completion_parks_the_value() {
        let executor = Executor::new(math_program());
        let tracer = executor
            .execute_function_background(
                "app.add",
                Args::new().arg(Value::Int(2)).arg(Value::Int(3)),
            )
            .unwrap();
        let mut outcome = None;
        for _ in 0..500 {
            if let Some(result) = tracer.result() {
                outcome = Some(result);
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(outcome, Some(Ok(Value::Int(5))));
    }

    #[test]
    fn out_of_scope_run_preserves_behavior_without_events() {
        let program = math_program();
        let traced = Executor::new(program.clone());
        let silent = Executor::new(program).with_scope(InclusionScope::new("elsewhere"));

        let args = Args::new().arg(Value::Int(3));
        let (traced_value, traced_tracer) =
            traced.execute_function("app.count", args.clone()).unwrap();
        let (silent_value, silent_tracer) =
            silent.execute_function("app.count", args).unwrap();

        assert_eq!(traced_value, silent_value);
        assert!(!traced_tracer.is_empty());
        assert!(silent_tracer.is_empty());
    }

    #[test]
    fn suspension_heavy_run_preserves_behavior_without_events() {
        // One callable exercising yield, await, and try/catch trace points.
        let mut root = Module::new("app");
        root.add_function(Function::new(
            "naturals",
            vec![Param::required("n")],
            vec![Stmt::For {
                var: "i".into(),
                iter: Expr::call("range", vec![Expr::var("n")]),
                body: vec![Stmt::Expr(Expr::yielded(Expr::var("i")))],
            }],
        ))
        .unwrap();
        root.add_function(Function::new_async(
            "lookup",
            vec![Param::required("x")],
            vec![Stmt::Return(Some(Expr::binary(
                BinaryOp::Mul,
                Expr::var("x"),
                Expr::int(10),
            )))],
        ))
        .unwrap();
        root.add_function(Function::new(
            "pipeline",
            vec![],
            vec![
                Stmt::Let {
                    name: "total".into(),
                    value: Expr::int(0),
                },
                Stmt::For {
                    var: "v".into(),
                    iter: Expr::call("naturals", vec![Expr::int(3)]),
                    body: vec![Stmt::Try {
                        body: vec![
                            Stmt::If {
                                cond: Expr::binary(BinaryOp::Eq, Expr::var("v"), Expr::int(1)),
                                then_body: vec![Stmt::Throw {
                                    tag: "Skip".into(),
                                    payload: Expr::Null,
                                }],
                                else_body: vec![],
                            },
                            Stmt::Assign {
                                name: "total".into(),
                                value: Expr::binary(
                                    BinaryOp::Add,
                                    Expr::var("total"),
                                    Expr::awaited(Expr::call("lookup", vec![Expr::var("v")])),
                                ),
                            },
                        ],
                        handlers: vec![xray_core::CatchClause {
                            tag: Some("Skip".into()),
                            binding: None,
                            body: vec![],
                        }],
                    }],
                },
                Stmt::Return(Some(Expr::var("total"))),
            ],
        ))
        .unwrap();
        let program = Program::new(root);

        let traced = Executor::new(program.clone());
        let silent = Executor::new(program).with_scope(InclusionScope::new("elsewhere"));
        let (traced_value, traced_tracer) =
            traced.execute_function("app.pipeline", Args::new()).unwrap();
        let (silent_value, silent_tracer) =
            silent.execute_function("app.pipeline", Args::new()).unwrap();

        // 0 and 2 pass through (times 10); 1 is skipped by the handler.
        assert_eq!(traced_value, Value::Int(20));
        assert_eq!(silent_value, traced_value);
        assert!(silent_tracer.is_empty());

        // The traced run saw every trace-point kind.
        let events = traced_tracer.snapshot();
        assert!(events.iter().any(|e| matches!(e, TraceEvent::Yield { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, TraceEvent::YieldResume { .. })));
        assert!(events.iter().any(|e| matches!(e, TraceEvent::Await { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            TraceEvent::Branch {
                kind: crate::event::BranchKind::ExceptGuard,
                ..
            }
        )));
    }

    proptest! {
        #[test]
        fn loop_trace_is_balanced_and_ordered(limit in 0i64..12) {
            let executor = Executor::new(math_program());
            let (value, tracer) = executor
                .execute_function("app.count", Args::new().arg(Value::Int(limit)))
                .unwrap();
            prop_assert_eq!(value, Value::Int(limit));

            let events = tracer.snapshot();
            let entries = events
                .iter()
                .filter(|e| matches!(e, TraceEvent::FunctionEntry { .. }))
                .count();
            let exits = events
                .iter()
                .filter(|e| matches!(e, TraceEvent::FunctionExit { .. }))
                .count();
            prop_assert_eq!(entries, exits);

            // One branch event per check, including the final false one.
            let branches = events
                .iter()
                .filter(|e| matches!(e, TraceEvent::Branch { .. }))
                .count();
            prop_assert_eq!(branches as i64, limit + 1);

            for pair in events.windows(2) {
                prop_assert!(pair[0].timestamp() <= pair[1].timestamp());
            }
        }
    }
}
