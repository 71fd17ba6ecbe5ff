use std::io::{self, Write};

use inkwell::{context::Context, module::Module};
use log::{debug, info};

use crate::ast::ASTNode;
use crate::codegen::{Codegen, Lowered};
use crate::error::Error;
use crate::jit;
use crate::lexer::{Lexer, Token};
use crate::parser::Parser;

#[derive(Debug, Clone)]
pub struct Options {
    /// run bare expressions and print their value
    pub evaluate: bool,
    /// print each parsed unit as an S-expression before lowering it
    pub emit_ast: bool,
    /// print the lowered form of each unit
    pub print_ir: bool,
    /// print the whole module once the input is exhausted
    pub dump_module: bool,
    /// write a prompt to the error channel before each unit
    pub prompt: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            evaluate: true,
            emit_ast: false,
            print_ir: true,
            dump_module: false,
            prompt: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub units: usize,
    pub failures: usize,
}

/// The read/lower/report loop. One diagnostic per failed unit, one report
/// per successful one; a failure never ends the session.
pub struct Driver<'ctx> {
    parser: Parser,
    codegen: Codegen<'ctx>,
    options: Options,
}

impl<'ctx> Driver<'ctx> {
    pub fn new(context: &'ctx Context, options: Options) -> Self {
        Driver {
            parser: Parser::default(),
            codegen: Codegen::new(context, "klang"),
            options,
        }
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.codegen.module
    }

    /// Consumes units until end of input. Only failures to write to `out` or
    /// `err` end the session early.
    pub fn run<I, W, E>(
        &mut self,
        lexer: &mut Lexer<I>,
        out: &mut W,
        err: &mut E,
    ) -> io::Result<Summary>
    where
        I: Iterator<Item = char>,
        W: Write,
        E: Write,
    {
        let mut summary = Summary::default();

        self.prompt(err)?;
        lexer.advance();

        while *lexer.current() != Token::Eof {
            let parsed = self.parser.parse_top(lexer);
            let res = match parsed {
                Ok(None) => {
                    self.prompt(err)?;
                    continue;
                }
                Ok(Some(node)) => self.handle(&node, out),
                Err(e) => {
                    // skip the offending token and resync on the next one
                    lexer.advance();
                    Err(Error::from(e))
                }
            };

            summary.units += 1;
            match res {
                Ok(()) => {}
                Err(Error::Io(e)) => return Err(e),
                Err(e) => {
                    summary.failures += 1;
                    writeln!(err, "error: {}", e)?;
                }
            }
            self.prompt(err)?;
        }

        if self.options.dump_module {
            let dump = self.codegen.module.print_to_string().to_string();
            writeln!(out, "{}", dump.trim_end())?;
        }

        info!(
            "processed {} units, {} failed",
            summary.units, summary.failures
        );
        Ok(summary)
    }

    fn prompt<E: Write>(&self, err: &mut E) -> io::Result<()> {
        if self.options.prompt {
            write!(err, "ready> ")?;
            err.flush()?;
        }
        Ok(())
    }

    fn handle<W: Write>(&mut self, node: &ASTNode, out: &mut W) -> Result<(), Error> {
        if self.options.emit_ast {
            writeln!(out, "{}", node)?;
        }

        let lowered = self.codegen.codegen(node)?;
        debug!("lowered {}", node);

        if self.options.print_ir {
            let heading = match lowered {
                Lowered::Declaration(_) => "Read extern:",
                Lowered::Definition(_) => "Read function definition:",
                Lowered::Expression(_) => "Read top-level expression:",
            };
            writeln!(out, "{}", heading)?;
            writeln!(out, "{}", lowered.render())?;
        }

        if let Lowered::Expression(toplevel) = lowered {
            if self.options.evaluate {
                let value = jit::evaluate(&self.codegen.module, toplevel)?;
                writeln!(out, "Evaluated to {}", value)?;
            }
        }

        Ok(())
    }
}
