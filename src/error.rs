use std::io;

use crate::codegen::CodegenError;
use crate::jit::JitError;
use crate::parser::ParserError;

/// Anything that can fail while processing one top-level unit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error(transparent)]
    Jit(#[from] JitError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
