//! Tree-walking evaluator for instrumented callables.
//!
//! The interpreter executes [`Op`] bodies produced by the instrumentor and
//! fires the attached probes into the run's [`Tracer`]. One interpreter
//! serves one run: its rewrite cache is keyed by qualified name, so every
//! callable is lowered at most once per run and always emits into the same
//! tracer.
//!
//! Generators are driven by internal iteration: a `for` loop over a generator
//! value invokes the generator body with a yield sink that runs the consumer
//! body once per yielded value. Control effects that must cross the
//! generator boundary without being caught by the generator's own `try`
//! statements (a `return` or a failure in the consumer body) travel as
//! [`Interrupt::Halt`] and are translated back at the drive site.

mod error;
mod value;

pub use error::RuntimeError;
pub use value::{DeferredValue, GeneratorValue, Value};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use xray_core::{BinaryOp, Expr, Program, Resolved, UnaryOp};

use crate::event::TraceEvent;
use crate::instrument::{Guard, Handler, InstrumentedFn, Instrumentor, Op};
use crate::stringify::stringify;
use crate::tracer::Tracer;

/// Evaluator limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum nested call depth before the run traps.
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_call_depth: 256,
        }
    }
}

/// Why evaluation stopped before reaching a value.
///
/// `Error` is an ordinary runtime trap, catchable by `try` when it is an
/// [`RuntimeError::Uncaught`]. `Halt` is a consumer-side control effect
/// unwinding through a suspended generator; nothing inside the generator may
/// intercept it.
#[derive(Debug)]
pub(crate) enum Interrupt {
    Error(RuntimeError),
    Halt(Halt),
}

#[derive(Debug)]
pub(crate) enum Halt {
    /// The consumer body executed `return` while the generator was live.
    Return(Option<Value>),
    /// The consumer body failed while the generator was live.
    Fail(RuntimeError),
}

impl From<RuntimeError> for Interrupt {
    fn from(e: RuntimeError) -> Self {
        Interrupt::Error(e)
    }
}

/// How a statement block finished.
enum Flow {
    Normal,
    Return(Option<Value>),
}

/// Receives yielded values; returns the value sent back on resumption.
type SinkFn<'a> = &'a mut dyn FnMut(Value) -> Result<Value, Interrupt>;

/// Immutable per-call context.
struct Frame {
    /// Qualified name of the executing callable.
    function: String,
    /// Namespace local callee names resolve in.
    module: String,
    traced: bool,
    depth: usize,
}

/// One call frame's variable bindings.
struct Env {
    vars: HashMap<String, Value>,
}

impl Env {
    fn new() -> Self {
        Env {
            vars: HashMap::new(),
        }
    }

    /// Introduces or shadows a binding.
    fn define(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::UnknownVariable {
                name: name.to_string(),
            }),
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// Executes instrumented callables of one program against one tracer.
pub struct Interpreter<'p> {
    program: &'p Program,
    instrumentor: Instrumentor,
    tracer: Tracer,
    config: EngineConfig,
    cache: RefCell<HashMap<String, Rc<InstrumentedFn>>>,
}

impl<'p> Interpreter<'p> {
    pub fn new(
        program: &'p Program,
        instrumentor: Instrumentor,
        tracer: Tracer,
        config: EngineConfig,
    ) -> Self {
        Interpreter {
            program,
            instrumentor,
            tracer,
            config,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Calls a function by qualified name with already-evaluated arguments.
    ///
    /// A generator function returns its suspended [`Value::Generator`]
    /// without executing; an async function at this outermost position is
    /// driven to completion as if awaited.
    pub fn run_function(
        &self,
        qualified: &str,
        positional: Vec<Value>,
        named: &[(String, Value)],
    ) -> Result<Value, RuntimeError> {
        let func = self
            .lookup_function(qualified)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: qualified.to_string(),
            })?;
        let bound = self.bind_named(&func, positional, named)?;
        if func.is_generator {
            return Ok(Value::Generator(GeneratorValue {
                function: func.qualified.clone(),
                args: bound,
            }));
        }
        self.call_plain(&func, bound, 1)
            .map(|v| v.unwrap_or(Value::Null))
            .map_err(escaped)
    }

    /// Executes a module's top-level body as a zero-argument callable.
    pub fn run_module(&self, qualified: &str) -> Result<Value, RuntimeError> {
        let func = self
            .lookup_module(qualified)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: qualified.to_string(),
            })?;
        self.call_plain(&func, Vec::new(), 1)
            .map(|v| v.unwrap_or(Value::Null))
            .map_err(escaped)
    }

    /// Binds positional plus named arguments against a callable's parameter
    /// list, applying defaults for what remains unbound.
    pub(crate) fn bind_named(
        &self,
        func: &InstrumentedFn,
        positional: Vec<Value>,
        named: &[(String, Value)],
    ) -> Result<Vec<Value>, RuntimeError> {
        if positional.len() > func.params.len() {
            return Err(RuntimeError::TooManyArguments {
                function: func.qualified.clone(),
                expected: func.params.len(),
                got: positional.len() + named.len(),
            });
        }
        let mut slots: Vec<Option<Value>> = vec![None; func.params.len()];
        for (slot, value) in slots.iter_mut().zip(positional) {
            *slot = Some(value);
        }
        for (name, value) in named {
            let index = func
                .params
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| RuntimeError::UnknownArgument {
                    function: func.qualified.clone(),
                    name: name.clone(),
                })?;
            if slots[index].is_some() {
                return Err(RuntimeError::DuplicateArgument {
                    function: func.qualified.clone(),
                    name: name.clone(),
                });
            }
            slots[index] = Some(value.clone());
        }
        self.fill_defaults(func, slots)
    }

    fn bind_positional(
        &self,
        func: &InstrumentedFn,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        if args.len() > func.params.len() {
            return Err(RuntimeError::TooManyArguments {
                function: func.qualified.clone(),
                expected: func.params.len(),
                got: args.len(),
            });
        }
        let mut slots: Vec<Option<Value>> = vec![None; func.params.len()];
        for (slot, value) in slots.iter_mut().zip(args) {
            *slot = Some(value);
        }
        self.fill_defaults(func, slots)
    }

    fn fill_defaults(
        &self,
        func: &InstrumentedFn,
        slots: Vec<Option<Value>>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut bound = Vec::with_capacity(slots.len());
        for (param, slot) in func.params.iter().zip(slots) {
            match slot {
                Some(value) => bound.push(value),
                None => match &param.default {
                    Some(expr) => bound.push(self.eval_default(func, expr)?),
                    None => {
                        return Err(RuntimeError::MissingArgument {
                            function: func.qualified.clone(),
                            param: param.name.clone(),
                        })
                    }
                },
            }
        }
        Ok(bound)
    }

    /// Evaluates a parameter default in an empty, untraced scope.
    fn eval_default(&self, func: &InstrumentedFn, expr: &Expr) -> Result<Value, RuntimeError> {
        let frame = Frame {
            function: func.qualified.clone(),
            module: func.module.clone(),
            traced: false,
            depth: 0,
        };
        let mut env = Env::new();
        let mut no_yield = no_yield_sink(func.qualified.clone());
        self.eval(&frame, &mut no_yield, &mut env, expr)
            .map_err(escaped)
    }

    fn lookup_function(&self, qualified: &str) -> Option<Rc<InstrumentedFn>> {
        if let Some(func) = self.cache.borrow().get(qualified) {
            return Some(func.clone());
        }
        match self.program.resolve(qualified) {
            Ok(Resolved::Function {
                module_path,
                function,
            }) => {
                let lowered = Rc::new(self.instrumentor.lower_function(
                    &module_path,
                    qualified,
                    function,
                ));
                self.cache
                    .borrow_mut()
                    .insert(qualified.to_string(), lowered.clone());
                Some(lowered)
            }
            _ => None,
        }
    }

    fn lookup_module(&self, qualified: &str) -> Option<Rc<InstrumentedFn>> {
        if let Some(func) = self.cache.borrow().get(qualified) {
            return Some(func.clone());
        }
        match self.program.resolve(qualified) {
            Ok(Resolved::Module { path, module }) => {
                let lowered = Rc::new(self.instrumentor.lower_module_body(&path, module));
                self.cache.borrow_mut().insert(path, lowered.clone());
                Some(lowered)
            }
            _ => None,
        }
    }

    /// Resolves a callee name as seen from `caller_module`: first as a local
    /// name in the caller's module, then as an absolute qualified path, then
    /// relative to the program root.
    fn resolve_callee(
        &self,
        caller_module: &str,
        callee: &str,
    ) -> Result<Rc<InstrumentedFn>, RuntimeError> {
        let root = &self.program.root().name;
        let candidates = [
            format!("{caller_module}.{callee}"),
            callee.to_string(),
            format!("{root}.{callee}"),
        ];
        for candidate in &candidates {
            if let Some(func) = self.lookup_function(candidate) {
                return Ok(func);
            }
        }
        Err(RuntimeError::UnknownFunction {
            name: callee.to_string(),
        })
    }

    fn emit(&self, event: TraceEvent) {
        self.tracer.append(event);
    }

    fn now(&self) -> f64 {
        self.tracer.elapsed()
    }

    /// Invokes a callable body with its own frame and environment.
    ///
    /// Returns the explicit return value, or `None` when the body fell off
    /// the end or executed a bare `return`. Emits paired entry/exit events
    /// for traced callables on every path out, including traps and
    /// generator abandonment.
    fn invoke(
        &self,
        func: &InstrumentedFn,
        bound: Vec<Value>,
        depth: usize,
        sink: SinkFn<'_>,
    ) -> Result<Option<Value>, Interrupt> {
        if depth > self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            }
            .into());
        }

        let frame = Frame {
            function: func.qualified.clone(),
            module: func.module.clone(),
            traced: func.traced,
            depth,
        };
        let mut env = Env::new();
        if frame.traced {
            let args = func
                .params
                .iter()
                .zip(&bound)
                .map(|(p, v)| (p.name.clone(), stringify(v)))
                .collect();
            self.emit(TraceEvent::FunctionEntry {
                function: frame.function.clone(),
                args,
                timestamp: self.now(),
            });
        }
        for (param, value) in func.params.iter().zip(bound) {
            env.define(&param.name, value);
        }

        let outcome = self.exec_block(&frame, sink, &mut env, &func.body);
        let returned = match outcome {
            Ok(Flow::Normal) | Ok(Flow::Return(None)) => None,
            Ok(Flow::Return(Some(value))) => Some(value),
            Err(interrupt) => {
                if frame.traced {
                    self.emit(TraceEvent::FunctionExit {
                        function: frame.function.clone(),
                        return_value: None,
                        timestamp: self.now(),
                    });
                }
                return Err(interrupt);
            }
        };
        if frame.traced {
            self.emit(TraceEvent::FunctionExit {
                function: frame.function.clone(),
                return_value: returned.as_ref().map(stringify),
                timestamp: self.now(),
            });
        }
        Ok(returned)
    }

    /// Invokes a non-generator callable, rejecting stray yields.
    fn call_plain(
        &self,
        func: &Rc<InstrumentedFn>,
        bound: Vec<Value>,
        depth: usize,
    ) -> Result<Option<Value>, Interrupt> {
        let mut no_yield = no_yield_sink(func.qualified.clone());
        self.invoke(func, bound, depth, &mut no_yield)
    }

    fn exec_block(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        ops: &[Op],
    ) -> Result<Flow, Interrupt> {
        for op in ops {
            match self.exec_op(frame, &mut *sink, env, op)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_op(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        op: &Op,
    ) -> Result<Flow, Interrupt> {
        match op {
            Op::Let { name, value } => {
                let v = self.eval(frame, sink, env, value)?;
                env.define(name, v);
                Ok(Flow::Normal)
            }
            Op::Assign { name, value } => {
                let v = self.eval(frame, sink, env, value)?;
                env.assign(name, v)?;
                Ok(Flow::Normal)
            }
            Op::Discard(value) => {
                self.eval(frame, sink, env, value)?;
                Ok(Flow::Normal)
            }
            Op::If {
                guard,
                then_body,
                else_body,
            } => {
                if self.eval_guard(frame, &mut *sink, env, guard)? {
                    self.exec_block(frame, sink, env, then_body)
                } else {
                    self.exec_block(frame, sink, env, else_body)
                }
            }
            Op::While { guard, body } => {
                while self.eval_guard(frame, &mut *sink, env, guard)? {
                    match self.exec_block(frame, &mut *sink, env, body)? {
                        Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Op::For { var, iter, body } => {
                let iterable = self.eval(frame, &mut *sink, env, iter)?;
                match iterable {
                    Value::List(items) => {
                        for item in items {
                            env.define(var, item);
                            match self.exec_block(frame, &mut *sink, env, body)? {
                                Flow::Normal => {}
                                flow @ Flow::Return(_) => return Ok(flow),
                            }
                        }
                        Ok(Flow::Normal)
                    }
                    Value::Generator(gen) => {
                        self.drive_generator(frame, sink, env, var, gen, body)
                    }
                    other => Err(RuntimeError::NotIterable {
                        got: other.type_name().to_string(),
                    }
                    .into()),
                }
            }
            Op::Return(value) => match value {
                Some(expr) => {
                    let v = self.eval(frame, sink, env, expr)?;
                    Ok(Flow::Return(Some(v)))
                }
                None => Ok(Flow::Return(None)),
            },
            Op::Throw { tag, payload } => {
                let payload = self.eval(frame, sink, env, payload)?;
                Err(RuntimeError::Uncaught {
                    tag: tag.clone(),
                    payload,
                }
                .into())
            }
            Op::Try { body, handlers } => {
                match self.exec_block(frame, &mut *sink, env, body) {
                    Err(Interrupt::Error(RuntimeError::Uncaught { tag, payload })) => {
                        self.run_handlers(frame, sink, env, handlers, tag, payload)
                    }
                    other => other,
                }
            }
        }
    }

    /// Tries handlers in order; each tag check is an exception-guard trace
    /// point. An unmatched exception is rethrown unchanged.
    fn run_handlers(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        handlers: &[Handler],
        tag: String,
        payload: Value,
    ) -> Result<Flow, Interrupt> {
        for handler in handlers {
            let matched = handler.tag.as_deref().map_or(true, |t| t == tag);
            if let Some(probe) = &handler.probe {
                self.emit(TraceEvent::Branch {
                    function: frame.function.clone(),
                    kind: probe.kind,
                    condition: probe.source.clone(),
                    variables: Vec::new(),
                    result: matched,
                    timestamp: self.now(),
                });
            }
            if matched {
                if let Some(binding) = &handler.binding {
                    env.define(binding, payload);
                }
                return self.exec_block(frame, sink, env, &handler.body);
            }
        }
        Err(RuntimeError::Uncaught { tag, payload }.into())
    }

    /// Evaluates a guard condition and fires its branch probe, if any.
    fn eval_guard(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        guard: &Guard,
    ) -> Result<bool, Interrupt> {
        let value = self.eval(frame, sink, env, &guard.cond)?;
        let result = match value {
            Value::Bool(b) => b,
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "Bool".to_string(),
                    got: other.type_name().to_string(),
                }
                .into())
            }
        };
        if let Some(probe) = &guard.probe {
            let variables = probe
                .vars
                .iter()
                .filter_map(|name| env.get(name).map(|v| (name.clone(), stringify(v))))
                .collect();
            self.emit(TraceEvent::Branch {
                function: frame.function.clone(),
                kind: probe.kind,
                condition: probe.source.clone(),
                variables,
                result,
                timestamp: self.now(),
            });
        }
        Ok(result)
    }

    /// Drives a generator with a consumer loop body via internal iteration.
    ///
    /// Consumer-side `return` and failures unwind through the generator as
    /// [`Halt`] so the generator's own handlers cannot catch them; the
    /// generator still emits its exit event on abandonment.
    fn drive_generator(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        var: &str,
        gen: GeneratorValue,
        body: &[Op],
    ) -> Result<Flow, Interrupt> {
        let func = self
            .lookup_function(&gen.function)
            .ok_or_else(|| RuntimeError::Internal {
                message: format!("generator '{}' not resolvable", gen.function),
            })?;
        let depth = frame.depth + 1;
        let consumer_sink = sink;
        let mut drive = |value: Value| -> Result<Value, Interrupt> {
            env.define(var, value);
            match self.exec_block(frame, &mut *consumer_sink, env, body) {
                Ok(Flow::Normal) => Ok(Value::Null),
                Ok(Flow::Return(v)) => Err(Interrupt::Halt(Halt::Return(v))),
                Err(Interrupt::Error(e)) => Err(Interrupt::Halt(Halt::Fail(e))),
                Err(halt) => Err(halt),
            }
        };
        match self.invoke(&func, gen.args, depth, &mut drive) {
            // The generator ran out; its return value is not the loop's.
            Ok(_) => Ok(Flow::Normal),
            Err(Interrupt::Halt(Halt::Return(v))) => Ok(Flow::Return(v)),
            Err(Interrupt::Halt(Halt::Fail(e))) => Err(Interrupt::Error(e)),
            Err(other) => Err(other),
        }
    }

    fn eval(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        expr: &Expr,
    ) -> Result<Value, Interrupt> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    RuntimeError::UnknownVariable {
                        name: name.clone(),
                    }
                    .into()
                }),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(frame, &mut *sink, env, item)?);
                }
                Ok(Value::List(values))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(frame, sink, env, operand)?;
                Ok(apply_unary(*op, v)?)
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let l = self.eval_bool(frame, &mut *sink, env, lhs)?;
                    if !l {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.eval_bool(frame, sink, env, rhs)?))
                }
                BinaryOp::Or => {
                    let l = self.eval_bool(frame, &mut *sink, env, lhs)?;
                    if l {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.eval_bool(frame, sink, env, rhs)?))
                }
                _ => {
                    let l = self.eval(frame, &mut *sink, env, lhs)?;
                    let r = self.eval(frame, &mut *sink, env, rhs)?;
                    Ok(apply_binary(*op, l, r)?)
                }
            },
            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, &mut *sink, env, arg)?);
                }
                self.eval_call(frame, callee, values)
            }
            Expr::Await(inner) => self.eval_await(frame, sink, env, inner),
            Expr::Yield(inner) => {
                let value = self.eval(frame, &mut *sink, env, inner)?;
                if frame.traced {
                    self.emit(TraceEvent::Yield {
                        function: frame.function.clone(),
                        value: stringify(&value),
                        timestamp: self.now(),
                    });
                }
                let sent = sink(value)?;
                if frame.traced {
                    self.emit(TraceEvent::YieldResume {
                        function: frame.function.clone(),
                        sent: stringify(&sent),
                        timestamp: self.now(),
                    });
                }
                Ok(sent)
            }
        }
    }

    fn eval_bool(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        expr: &Expr,
    ) -> Result<bool, Interrupt> {
        match self.eval(frame, sink, env, expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::TypeMismatch {
                expected: "Bool".to_string(),
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Calls a resolved function, or falls back to a builtin.
    ///
    /// Generator and async callees do not execute here: they produce
    /// suspended values to be driven by `for` or `await`.
    fn eval_call(
        &self,
        frame: &Frame,
        callee: &str,
        args: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        match self.resolve_callee(&frame.module, callee) {
            Ok(func) => {
                let bound = self.bind_positional(&func, args)?;
                if func.is_generator {
                    return Ok(Value::Generator(GeneratorValue {
                        function: func.qualified.clone(),
                        args: bound,
                    }));
                }
                if func.is_async {
                    return Ok(Value::Deferred(DeferredValue {
                        function: func.qualified.clone(),
                        args: bound,
                    }));
                }
                Ok(self
                    .call_plain(&func, bound, frame.depth + 1)?
                    .unwrap_or(Value::Null))
            }
            Err(RuntimeError::UnknownFunction { .. }) => {
                Ok(call_builtin(callee, args)?)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Awaiting a deferred value runs its body; anything else passes
    /// through. The await event is appended after resumption so its
    /// timestamp reflects the full suspension cycle.
    fn eval_await(
        &self,
        frame: &Frame,
        sink: SinkFn<'_>,
        env: &mut Env,
        inner: &Expr,
    ) -> Result<Value, Interrupt> {
        let awaited = self.eval(frame, &mut *sink, env, inner)?;
        let awaited_text = stringify(&awaited);
        let result = match awaited {
            Value::Deferred(deferred) => {
                let func = self
                    .lookup_function(&deferred.function)
                    .ok_or_else(|| RuntimeError::Internal {
                        message: format!("deferred '{}' not resolvable", deferred.function),
                    })?;
                self.call_plain(&func, deferred.args, frame.depth + 1)?
                    .unwrap_or(Value::Null)
            }
            other => other,
        };
        if frame.traced {
            self.emit(TraceEvent::Await {
                function: frame.function.clone(),
                expression: inner.to_string(),
                awaited: awaited_text,
                result: stringify(&result),
                timestamp: self.now(),
            });
        }
        Ok(result)
    }
}

/// Maps an interrupt escaping the outermost frame to its runtime error. A
/// halt cannot escape: the drive site that created it always translates it.
fn escaped(interrupt: Interrupt) -> RuntimeError {
    match interrupt {
        Interrupt::Error(e) => e,
        Interrupt::Halt(Halt::Fail(e)) => e,
        Interrupt::Halt(Halt::Return(_)) => RuntimeError::Internal {
            message: "generator halt escaped the run".to_string(),
        },
    }
}

fn no_yield_sink(function: String) -> impl FnMut(Value) -> Result<Value, Interrupt> {
    move |_| Err(RuntimeError::YieldOutsideGenerator {
        function: function.clone(),
    }
    .into())
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(v)) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(RuntimeError::TypeMismatch {
            expected: "Int or Float".to_string(),
            got: other.type_name().to_string(),
        }),
        (UnaryOp::Not, other) => Err(RuntimeError::TypeMismatch {
            expected: "Bool".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, lhs, rhs),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arith(op, lhs, rhs),
        // Short-circuit operators are handled before operand evaluation.
        BinaryOp::And | BinaryOp::Or => Err(RuntimeError::Internal {
            message: "short-circuit operator reached strict evaluation".to_string(),
        }),
    }
}

fn compare(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    use std::cmp::Ordering;
    let ordering = match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: "comparable values of matching type".to_string(),
                got: format!("{} {} {}", lhs.type_name(), op.symbol(), rhs.type_name()),
            })
        }
    };
    let result = match ordering {
        Some(ord) => match op {
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::Ge => ord != Ordering::Less,
            _ => unreachable!("compare called with non-comparison operator"),
        },
        // NaN compares false against everything.
        None => false,
    };
    Ok(Value::Bool(result))
}

fn arith(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, a, b),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_arith(op, a, b))),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_arith(op, a as f64, b))),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_arith(op, a, b as f64))),
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(a + &b)),
        (Value::List(mut a), Value::List(b)) if op == BinaryOp::Add => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (lhs, rhs) => Err(RuntimeError::TypeMismatch {
            expected: "numeric operands".to_string(),
            got: format!("{} {} {}", lhs.type_name(), op.symbol(), rhs.type_name()),
        }),
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            a.checked_div(b)
        }
        _ => unreachable!("int_arith called with non-arithmetic operator"),
    };
    result.map(Value::Int).ok_or(RuntimeError::IntegerOverflow)
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => unreachable!("float_arith called with non-arithmetic operator"),
    }
}

/// Builtins available to every target program by bare name.
fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match name {
        "sleep_ms" => {
            let ms = match args.as_slice() {
                [Value::Int(ms)] if *ms >= 0 => *ms as u64,
                _ => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "sleep_ms(non-negative Int)".to_string(),
                        got: describe_args(&args),
                    })
                }
            };
            thread::sleep(Duration::from_millis(ms));
            Ok(Value::Null)
        }
        "range" => {
            let (start, end) = match args.as_slice() {
                [Value::Int(end)] => (0, *end),
                [Value::Int(start), Value::Int(end)] => (*start, *end),
                _ => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "range(Int) or range(Int, Int)".to_string(),
                        got: describe_args(&args),
                    })
                }
            };
            Ok(Value::List((start..end).map(Value::Int).collect()))
        }
        "len" => match args.as_slice() {
            [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "len(List) or len(Str)".to_string(),
                got: describe_args(&args),
            }),
        },
        _ => Err(RuntimeError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

fn describe_args(args: &[Value]) -> String {
    let types: Vec<&str> = args.iter().map(Value::type_name).collect();
    format!("({})", types.join(", "))
}
