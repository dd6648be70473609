//! Surface expressions: tokens, lexer, AST, parser, and lowering to engine
//! terms.

pub mod ast;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod tokens;

use bitsolve_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("unsupported operator `{op}` at line {line}, col {col}")]
    UnsupportedOperator { op: String, line: usize, col: usize },
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),
    #[error("literal {value} does not fit in {width} bits")]
    LiteralOverflow { value: u64, width: u32 },
    #[error("unsupported literal {literal} at line {line}, col {col}")]
    UnsupportedLiteral { literal: String, line: usize, col: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}
