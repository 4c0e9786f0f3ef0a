//! stackbind-demo: a native function taking an optional guest callback
//!
//! The host installs `do_the_thing(a, b, callback?)` as a guest global. A
//! guest script function then calls it, passing one of the guest arithmetic
//! functions as the callback, or nil. `do_the_thing` executes the callback
//! when one was given and returns 0 otherwise.

use clap::{Parser, ValueEnum};
use serde::Serialize;
use stackbind::{Error, Function, Global, Globals, Library, State, ValueCategory, pop};
use stackbind_core::{GuestError, GuestResult, ResultMode, RuntimeConfig};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "stackbind-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Call a native function from guest code, with an optional guest callback", long_about = None)]
struct Cli {
    /// First operand
    #[arg(allow_negative_numbers = true)]
    a: i32,

    /// Second operand
    #[arg(allow_negative_numbers = true)]
    b: i32,

    /// Guest function passed as the callback
    #[arg(long, value_enum, default_value_t = Op::Mul)]
    op: Op,

    /// Pass nil instead of a callback
    #[arg(long)]
    no_callback: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Op {
    Add,
    Sub,
    Mul,
}

impl Op {
    fn global_name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    a: i32,
    b: i32,
    callback: Option<Op>,
    result: i32,
    result_type: ValueCategory,
    registry_slots: usize,
    globals: Vec<String>,
}

// ============================================================================
// Guest side
// ============================================================================

fn operands(state: &State) -> GuestResult<(f64, f64)> {
    let a = state
        .to_number(1)
        .ok_or_else(|| GuestError::new("bad argument #1 (number expected)"))?;
    let b = state
        .to_number(2)
        .ok_or_else(|| GuestError::new("bad argument #2 (number expected)"))?;
    Ok((a, b))
}

fn guest_add(state: &State) -> GuestResult<usize> {
    let (a, b) = operands(state)?;
    state.push_number(a + b);
    Ok(1)
}

fn guest_sub(state: &State) -> GuestResult<usize> {
    let (a, b) = operands(state)?;
    state.push_number(a - b);
    Ok(1)
}

fn guest_mul(state: &State) -> GuestResult<usize> {
    let (a, b) = operands(state)?;
    state.push_number(a * b);
    Ok(1)
}

/// The guest script: `result = do_the_thing(a, b, callback)`
fn script(state: &State) -> GuestResult<usize> {
    state.push_global("do_the_thing");
    state.push_global("a");
    state.push_global("b");
    state.push_global("callback");
    state.call(3, ResultMode::Fixed(1));
    state.store_global("result");
    Ok(0)
}

// ============================================================================
// Host side
// ============================================================================

fn do_the_thing() -> Function<(i32, i32, Option<Function<(i32, i32), i32>>), i32> {
    Function::new(
        |a: i32, b: i32, callback: Option<Function<(i32, i32), i32>>| match callback {
            Some(callback) => callback.execute((a, b)).unwrap_or_else(|err| {
                warn!(error = %err, "callback failed");
                0
            }),
            None => 0,
        },
    )
}

fn run(state: &State, cli: &Cli) -> Result<Report, Error> {
    state.open_library(Library::All);
    state.register("add", guest_add);
    state.register("sub", guest_sub);
    state.register("mul", guest_mul);

    state.set_global("do_the_thing", &do_the_thing())?;
    state.set_global("a", &cli.a)?;
    state.set_global("b", &cli.b)?;

    let callback = (!cli.no_callback).then_some(cli.op);
    if let Some(op) = callback {
        state.push_global(op.global_name());
        state.store_global("callback");
    }
    debug!(?callback, "globals installed");

    state.push_function(script);
    let script = pop::<Function<(), ()>>(state)
        .ok_or_else(|| Error::marshal("run", "script is not a function"))?;
    script.execute_protected(())?;
    drop(script);

    let result = match state.get_global::<i32>("result") {
        Global::Found(result) => result,
        Global::NotFound => return Err(Error::marshal("run", "script produced no result")),
        Global::WrongType(category) => {
            return Err(Error::marshal(
                "run",
                format!("result has type {}", category),
            ));
        }
    };
    info!(a = cli.a, b = cli.b, result, "do_the_thing returned");

    Ok(Report {
        a: cli.a,
        b: cli.b,
        callback,
        result,
        result_type: state.global_type("result"),
        registry_slots: state.registry_len(),
        globals: state.global_names(),
    })
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stackbind=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let state = State::with_config(RuntimeConfig::from_env());
    let report = match run(&state, &cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: failed to render report: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!("do_the_thing({}, {}) = {}", report.a, report.b, report.result);
    }
}
