//! bitsolve
//!
//! Compiles small arithmetic/boolean expressions into bitvector constraints
//! for a decision-procedure engine, and decodes the engine's counterexample
//! values back into fixed-width integers.
//!
//! ```no_run
//! use bitsolve::Session;
//!
//! let mut session = Session::builtin();
//! let x = session.declare("x", 8)?;
//! let y = session.declare("y", 8)?;
//! session.add_from_source("x + y == 10")?;
//! let values = session.solve(&[x, y])?;
//! assert_eq!((values[0] + values[1]) % 256, 10);
//! # Ok::<(), bitsolve::Error>(())
//! ```

pub mod compiler;
pub mod config;
pub mod decode;
pub mod registry;
pub mod session;

pub use bitsolve_engine as engine;
pub use compiler::ast::{BinOp, Expr, UnaryOp};
pub use compiler::parser::{parse_expression, ParseError};
pub use compiler::CompileError;
pub use config::{ConfigError, SessionConfig};
pub use decode::{decode, decode_signed, decode_unsigned, DecodeError, DecodedValue, Signedness};
pub use registry::{Registry, SymbolicVariable};
pub use session::Session;

use bitsolve_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(CompileError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("the assertions are unsatisfiable")]
    Unsatisfiable,
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Engine failures raised while compiling are reported as engine errors.
impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Engine(e) => Error::Engine(e),
            other => Error::Compile(other),
        }
    }
}
