//! JavaScript parser and compiler
//!
//! Source text is parsed into a syntax tree with a scope tree alongside it,
//! then compiled to [`FunctionBytecode`].

pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod parser;

use std::rc::Rc;

use log::trace;
use thiserror::Error;

use crate::engine::JSContext;
use crate::object::FunctionBytecode;

pub use compiler::Compiler;
pub use lexer::{Lexer, Token};
pub use parser::Parser;

/// Deepest nesting of recursive productions the parser accepts
pub const MAX_NESTING: usize = 200;

/// Deepest syntax tree the compiler walks
pub const MAX_TREE_DEPTH: usize = 256;

/// Syntax error found while compiling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Compile a script or module to its top-level function
pub fn compile(
    ctx: &JSContext,
    source: &str,
    filename: &str,
    module: bool,
) -> Result<Rc<FunctionBytecode>, CompileError> {
    compile_with(ctx, source, filename, module, false)
}

/// Like [`compile`], optionally forcing strict mode
pub fn compile_with(
    ctx: &JSContext,
    source: &str,
    filename: &str,
    module: bool,
    strict: bool,
) -> Result<Rc<FunctionBytecode>, CompileError> {
    trace!("compiling {} ({} bytes)", filename, source.len());
    let program = Parser::new(source).parse_program(module, strict)?;
    let func = Compiler::new(ctx, &program.scopes, filename).compile_program(&program)?;
    #[cfg(feature = "dump")]
    log::debug!("{}", crate::vm::disassemble(&func));
    Ok(func)
}
