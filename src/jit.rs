//! Runs top-level expressions with LLVM's MCJIT. Declarations resolve to a
//! fixed table of native functions compiled into this crate.

use std::collections::HashMap;
use std::io::{self, Write};

use inkwell::{
    execution_engine::{ExecutionEngine, JitFunction},
    module::Module,
    targets::{InitializationConfig, Target},
    values::{BasicValue, FunctionValue},
    OptimizationLevel,
};
use lazy_static::lazy_static;
use log::trace;

use crate::codegen::TopLevel;

type EntryFunc = unsafe extern "C" fn() -> f64;
type Unary = extern "C" fn(f64) -> f64;
type Binary = extern "C" fn(f64, f64) -> f64;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum JitError {
    #[error("failed to initialize the native target: {0}")]
    Target(String),
    #[error("failed to link top-level expression: {0}")]
    Link(String),
    #[error("failed to create execution engine: {0}")]
    Engine(String),
    #[error("unresolved external symbol '{0}'")]
    UnresolvedSymbol(String),
    #[error("'{0}' takes {1} arguments, declared with {2}")]
    Arity(String, usize, usize),
    #[error("failed to look up '{0}': {1}")]
    Lookup(String, String),
}

pub struct Native {
    pub arity: usize,
    address: usize,
}

mod natives {
    use super::*;

    pub extern "C" fn sin(x: f64) -> f64 {
        x.sin()
    }

    pub extern "C" fn cos(x: f64) -> f64 {
        x.cos()
    }

    pub extern "C" fn tan(x: f64) -> f64 {
        x.tan()
    }

    pub extern "C" fn sqrt(x: f64) -> f64 {
        x.sqrt()
    }

    pub extern "C" fn exp(x: f64) -> f64 {
        x.exp()
    }

    pub extern "C" fn log(x: f64) -> f64 {
        x.ln()
    }

    pub extern "C" fn fabs(x: f64) -> f64 {
        x.abs()
    }

    pub extern "C" fn floor(x: f64) -> f64 {
        x.floor()
    }

    pub extern "C" fn pow(x: f64, y: f64) -> f64 {
        x.powf(y)
    }

    /// writes the character with code `x` to stderr
    pub extern "C" fn putchard(x: f64) -> f64 {
        let c = std::char::from_u32(x as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
        let mut err = io::stderr();
        // nowhere to report a failed write from inside jitted code
        let _ = write!(err, "{}", c).and_then(|_| err.flush());
        0.0
    }

    /// writes `x` and a newline to stderr
    pub extern "C" fn printd(x: f64) -> f64 {
        let _ = writeln!(io::stderr(), "{}", x);
        0.0
    }
}

fn unary(func: Unary) -> Native {
    Native {
        arity: 1,
        address: func as usize,
    }
}

fn binary(func: Binary) -> Native {
    Native {
        arity: 2,
        address: func as usize,
    }
}

lazy_static! {
    static ref NATIVES: HashMap<&'static str, Native> = {
        let mut natives = HashMap::new();
        natives.insert("sin", unary(natives::sin));
        natives.insert("cos", unary(natives::cos));
        natives.insert("tan", unary(natives::tan));
        natives.insert("sqrt", unary(natives::sqrt));
        natives.insert("exp", unary(natives::exp));
        natives.insert("log", unary(natives::log));
        natives.insert("fabs", unary(natives::fabs));
        natives.insert("floor", unary(natives::floor));
        natives.insert("pow", binary(natives::pow));
        natives.insert("putchard", unary(natives::putchard));
        natives.insert("printd", unary(natives::printd));
        natives
    };
}

pub fn native(name: &str) -> Option<&'static Native> {
    NATIVES.get(name)
}

/// Maps a declaration onto its native, if anything calls it.
fn bind<'ctx>(engine: &ExecutionEngine<'ctx>, function: FunctionValue<'ctx>) -> Result<(), JitError> {
    let name = function.get_name().to_string_lossy();
    let used = function
        .as_global_value()
        .as_pointer_value()
        .get_first_use()
        .is_some();
    if !used {
        return Ok(());
    }

    match native(&name) {
        None => Err(JitError::UnresolvedSymbol(name.into_owned())),
        Some(native) if native.arity != function.count_params() as usize => Err(JitError::Arity(
            name.into_owned(),
            native.arity,
            function.count_params() as usize,
        )),
        Some(native) => {
            trace!("binding '{}' to its native", name);
            engine.add_global_mapping(&function, native.address);
            Ok(())
        }
    }
}

/// Evaluates `toplevel` against the functions published in `module`.
///
/// The session module is cloned and the expression linked into the clone,
/// so nothing the engine does is visible in `module` afterwards.
pub fn evaluate<'ctx>(module: &Module<'ctx>, toplevel: TopLevel<'ctx>) -> Result<f64, JitError> {
    Target::initialize_native(&InitializationConfig::default()).map_err(JitError::Target)?;

    let name = toplevel.function.get_name().to_string_lossy().into_owned();
    let session = module.clone();
    session
        .link_in_module(toplevel.module)
        .map_err(|e| JitError::Link(e.to_string()))?;

    let engine = session
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| JitError::Engine(e.to_string()))?;

    let mut next = session.get_first_function();
    while let Some(function) = next {
        if function.count_basic_blocks() == 0 {
            bind(&engine, function)?;
        }
        next = function.get_next_function();
    }

    let entry: JitFunction<EntryFunc> = unsafe { engine.get_function(&name) }
        .map_err(|e| JitError::Lookup(name.clone(), e.to_string()))?;

    Ok(unsafe { entry.call() })
}
