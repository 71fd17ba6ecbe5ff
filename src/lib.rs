//! klang: lexer, parser and LLVM lowering pass for a tiny expression
//! language, with bare expressions evaluated by MCJIT.
//!
//! A session reads one top-level unit at a time: the `lexer` hands tokens to
//! the `parser`, the resulting `ast` node is lowered by `codegen` into an
//! LLVM module, and bare expressions are run by `jit`. The `driver` ties the
//! stages together and reports each unit.

pub mod ast;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod jit;
pub mod lexer;
pub mod parser;

pub use error::Error;
