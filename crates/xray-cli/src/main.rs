//! Trace-collection CLI.
//!
//! Provides the `xray` binary with a `run` subcommand that loads a target
//! program from a JSON file, executes one of its functions or modules under
//! observation, and prints the collected trace as text or JSON. Uses the
//! same `xray_engine::Executor` as library callers, so traces are identical
//! from both entry points.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use xray_core::Program;
use xray_engine::{Args, EngineConfig, ExecError, Executor, InclusionScope, Value};

/// Execution tracer for target programs.
#[derive(Parser)]
#[command(name = "xray", about = "Execution tracer for target programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run a function or module under observation and print its trace.
    Run {
        /// Path to the program JSON file.
        #[arg(short, long)]
        program: PathBuf,

        /// Qualified name of the entry point, e.g. `app.util.add`.
        #[arg(short, long)]
        target: String,

        /// Execute the target as a module body instead of a function.
        #[arg(long)]
        module: bool,

        /// Positional argument as a JSON value; repeatable.
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// Named argument as `name=JSON`; repeatable.
        #[arg(short, long = "named")]
        named: Vec<String>,

        /// Extra namespace prefix to observe; repeatable.
        #[arg(short, long = "include")]
        includes: Vec<String>,

        /// Maximum nested call depth before the run traps.
        #[arg(long, default_value_t = 256)]
        max_call_depth: usize,

        /// Trace output format.
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Also write an HTML flow-diagram report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            program,
            target,
            module,
            args,
            named,
            includes,
            max_call_depth,
            format,
            report,
        } => {
            let exit_code = run(
                &program,
                &target,
                module,
                &args,
                &named,
                includes,
                max_call_depth,
                format,
                report,
            );
            process::exit(exit_code);
        }
    }
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = success, 1 = invalid input (program, arguments,
/// or target name), 2 = target runtime failure, 3 = I/O error.
#[allow(clippy::too_many_arguments)]
fn run(
    program_path: &PathBuf,
    target: &str,
    as_module: bool,
    raw_args: &[String],
    raw_named: &[String],
    includes: Vec<String>,
    max_call_depth: usize,
    format: Format,
    report: Option<PathBuf>,
) -> i32 {
    let source = match std::fs::read_to_string(program_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "Error: failed to read program '{}': {}",
                program_path.display(),
                e
            );
            return 3;
        }
    };
    let program: Program = match serde_json::from_str(&source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: invalid program JSON: {}", e);
            return 1;
        }
    };

    let args = match parse_args(raw_args, raw_named) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 1;
        }
    };

    let mut scope = InclusionScope::new(program.root().name.clone());
    for include in includes {
        scope.include(include);
    }
    let executor = Executor::new(program)
        .with_scope(scope)
        .with_config(EngineConfig { max_call_depth });

    let outcome = if as_module {
        executor.execute_module(target)
    } else {
        executor.execute_function(target, args)
    };

    match outcome {
        Ok((value, tracer)) => {
            match format {
                Format::Text => {
                    print!("{}", tracer.format_traces());
                    println!("=> {}", xray_engine::stringify::stringify(&value));
                }
                Format::Json => {
                    let document = serde_json::json!({
                        "result": value,
                        "events": serde_json::from_str::<serde_json::Value>(&tracer.dump_json())
                            .unwrap_or(serde_json::Value::Null),
                    });
                    let rendered = serde_json::to_string_pretty(&document)
                        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
                    println!("{}", rendered);
                }
            }
            if let Some(path) = report {
                if let Err(e) = tracer.dump_report_file(&path) {
                    eprintln!("Error: failed to write report '{}': {}", path.display(), e);
                    return 3;
                }
            }
            0
        }
        Err(ExecError::Target(e)) => {
            eprintln!("Runtime error in '{}': {}", target, e);
            2
        }
        Err(ExecError::Spawn { message }) => {
            eprintln!("Error: {}", message);
            3
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Parse positional JSON arguments and `name=JSON` named arguments.
fn parse_args(raw_args: &[String], raw_named: &[String]) -> Result<Args, String> {
    let mut args = Args::new();
    for raw in raw_args {
        args = args.arg(parse_value(raw)?);
    }
    for raw in raw_named {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("named argument '{}' is not name=value", raw))?;
        args = args.named(name, parse_value(value)?);
    }
    Ok(args)
}

/// Parse one JSON literal into a runtime value.
fn parse_value(raw: &str) -> Result<Value, String> {
    let json: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| format!("invalid argument '{}': {}", raw, e))?;
    json_to_value(&json).ok_or_else(|| format!("unsupported argument value '{}'", raw))
}

fn json_to_value(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else {
                n.as_f64().map(Value::Float)
            }
        }
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_to_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        // Objects have no runtime counterpart.
        serde_json::Value::Object(_) => None,
    }
}
