//! Decision-procedure capability surface for the bitsolve front end.
//!
//! The front end never talks to a solver directly.  It is written against the
//! [`Engine`] trait, which mirrors the handful of calls a validity checker
//! exposes: build sorts and terms, assert formulas, issue a validity query,
//! and read values back out of the resulting counterexample.
//!
//! Two backends are provided:
//!
//! - **[`BuiltinEngine`]**: an in-process term arena with a bounded model
//!   search.  Always available, deterministic, and used by the test suites.
//! - **[`Z3ProcessEngine`]**: renders the arena to SMT-LIB2 and drives a `z3`
//!   binary over stdin/stdout.
//!
//! [`AnyEngine`] picks one of them at runtime from an [`EngineKind`].
//!
//! Every capability returns `Result<_, EngineError>`.  There is no global
//! error callback; a failing call reports its message to the caller and the
//! context stays usable.

pub mod arena;
pub mod builtin;
pub mod smtlib;
pub mod z3;

pub use arena::{Assignment, TermArena, TermId, Value};
pub use builtin::BuiltinEngine;
pub use z3::Z3ProcessEngine;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Widest bitvector any backend in this crate accepts.
pub const MAX_WIDTH: u32 = 64;

// ── Sorts and operators ─────────────────────────────────────────────

/// Sort (type) of an engine term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    BitVec(u32),
}

impl Sort {
    /// Width of a bitvector sort, `None` for booleans.
    pub fn width(self) -> Option<u32> {
        match self {
            Sort::Bool => None,
            Sort::BitVec(w) => Some(w),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(w) => write!(f, "(_ BitVec {})", w),
        }
    }
}

/// Operator applied by [`Engine::build_term`].
///
/// The string form is the SMT-LIB2 function symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum TermOp {
    #[strum(serialize = "bvadd")]
    BvAdd,
    #[strum(serialize = "bvsub")]
    BvSub,
    #[strum(serialize = "bvmul")]
    BvMul,
    #[strum(serialize = "bvudiv")]
    BvDiv,
    #[strum(serialize = "bvurem")]
    BvMod,
    #[strum(serialize = "bvshl")]
    BvShl,
    #[strum(serialize = "bvlshr")]
    BvLshr,
    #[strum(serialize = "bvand")]
    BvAnd,
    #[strum(serialize = "bvor")]
    BvOr,
    #[strum(serialize = "bvxor")]
    BvXor,
    #[strum(serialize = "bvnot")]
    BvNot,
    #[strum(serialize = "bvneg")]
    BvNeg,
    #[strum(serialize = "bvult")]
    BvUlt,
    #[strum(serialize = "bvule")]
    BvUle,
    #[strum(serialize = "bvugt")]
    BvUgt,
    #[strum(serialize = "bvuge")]
    BvUge,
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "not")]
    Not,
}

impl TermOp {
    /// Operators whose result width is the explicit width parameter.
    pub fn takes_width(self) -> bool {
        matches!(
            self,
            TermOp::BvAdd
                | TermOp::BvSub
                | TermOp::BvMul
                | TermOp::BvDiv
                | TermOp::BvMod
                | TermOp::BvShl
                | TermOp::BvLshr
        )
    }

    /// Operators that produce a boolean term.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            TermOp::BvUlt
                | TermOp::BvUle
                | TermOp::BvUgt
                | TermOp::BvUge
                | TermOp::Eq
                | TermOp::And
                | TermOp::Or
                | TermOp::Not
        )
    }
}

/// Outcome of a validity query.
///
/// `query(F)` asks whether `F` holds in every model of the current
/// assertions.  `Invalid` means a counterexample exists and can be fetched
/// with [`Engine::model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Valid,
    Invalid,
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("sort mismatch: {0}")]
    Sort(String),
    #[error("unsupported bit-width {width}: {reason}")]
    Width { width: u32, reason: String },
    #[error("division by constant zero in `{0}`")]
    DivisionByZero(String),
    #[error("search inconclusive after {explored} candidate assignments")]
    Inconclusive { explored: u64 },
    #[error("solver process failed: {0}")]
    Process(String),
    #[error("solver unavailable: {0}")]
    Unavailable(String),
    #[error("term #{0} does not belong to this context")]
    UnknownTerm(u32),
    #[error("no counterexample available: {0}")]
    NoModel(String),
    #[error("{0}")]
    Backend(String),
}

// ── Engine trait ────────────────────────────────────────────────────

/// Capability set of a bitvector validity checker.
///
/// One value of an implementing type is one engine context.  Dropping it
/// releases the context.  Calls take `&mut self`, so a context has a single
/// owner and is driven strictly sequentially.
pub trait Engine {
    /// Handle to a term living inside this context.
    type Term: Clone + fmt::Debug;
    /// Counterexample produced by the last `Invalid` query.
    type Model;

    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    fn bitvector_sort(&mut self, width: u32) -> Result<Sort, EngineError> {
        if width == 0 || width > MAX_WIDTH {
            return Err(EngineError::Width {
                width,
                reason: format!("bitvector widths must be within 1..={}", MAX_WIDTH),
            });
        }
        Ok(Sort::BitVec(width))
    }

    fn declare_symbol(&mut self, name: &str, sort: Sort) -> Result<Self::Term, EngineError>;

    /// Apply `op` to `operands`.  `width` is consulted by the arithmetic and
    /// shift operators; the others infer it from their operands.
    fn build_term(
        &mut self,
        op: TermOp,
        width: Option<u32>,
        operands: &[Self::Term],
    ) -> Result<Self::Term, EngineError>;

    fn build_constant(&mut self, width: u32, value: u64) -> Result<Self::Term, EngineError>;

    fn true_term(&mut self) -> Result<Self::Term, EngineError>;

    fn false_term(&mut self) -> Result<Self::Term, EngineError>;

    fn assert_formula(&mut self, term: &Self::Term) -> Result<(), EngineError>;

    fn query(&mut self, formula: &Self::Term) -> Result<QueryOutcome, EngineError>;

    /// Counterexample of the most recent `Invalid` query.
    fn model(&mut self) -> Result<Self::Model, EngineError>;

    /// Value of `term` under `model`, in the engine's native `0x…` form.
    fn project(&mut self, model: &Self::Model, term: &Self::Term) -> Result<String, EngineError>;

    fn stringify(&self, term: &Self::Term) -> Result<String, EngineError>;

    fn bit_width(&self, term: &Self::Term) -> Result<u32, EngineError>;
}

// ── Runtime backend selection ───────────────────────────────────────

/// Which backend to construct.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Builtin,
    Z3,
}

/// Either backend, chosen at runtime.
///
/// Both backends share the [`TermArena`], so terms and models have the same
/// representation whichever one is active.
#[derive(Debug)]
pub enum AnyEngine {
    Builtin(BuiltinEngine),
    Z3(Z3ProcessEngine),
}

impl AnyEngine {
    /// Build the backend named by `kind`.
    ///
    /// `search_limit` applies to the builtin search; `z3_path` to the
    /// process backend.
    pub fn create(kind: EngineKind, search_limit: u64, z3_path: &Path) -> Result<Self, EngineError> {
        match kind {
            EngineKind::Builtin => Ok(AnyEngine::Builtin(BuiltinEngine::with_search_limit(
                search_limit,
            ))),
            EngineKind::Z3 => Ok(AnyEngine::Z3(Z3ProcessEngine::with_binary(z3_path)?)),
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            AnyEngine::Builtin(_) => EngineKind::Builtin,
            AnyEngine::Z3(_) => EngineKind::Z3,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $engine:ident => $body:expr) => {
        match $self {
            AnyEngine::Builtin($engine) => $body,
            AnyEngine::Z3($engine) => $body,
        }
    };
}

impl Engine for AnyEngine {
    type Term = TermId;
    type Model = Assignment;

    fn name(&self) -> &str {
        dispatch!(self, e => e.name())
    }

    fn declare_symbol(&mut self, name: &str, sort: Sort) -> Result<TermId, EngineError> {
        dispatch!(self, e => e.declare_symbol(name, sort))
    }

    fn build_term(
        &mut self,
        op: TermOp,
        width: Option<u32>,
        operands: &[TermId],
    ) -> Result<TermId, EngineError> {
        dispatch!(self, e => e.build_term(op, width, operands))
    }

    fn build_constant(&mut self, width: u32, value: u64) -> Result<TermId, EngineError> {
        dispatch!(self, e => e.build_constant(width, value))
    }

    fn true_term(&mut self) -> Result<TermId, EngineError> {
        dispatch!(self, e => e.true_term())
    }

    fn false_term(&mut self) -> Result<TermId, EngineError> {
        dispatch!(self, e => e.false_term())
    }

    fn assert_formula(&mut self, term: &TermId) -> Result<(), EngineError> {
        dispatch!(self, e => e.assert_formula(term))
    }

    fn query(&mut self, formula: &TermId) -> Result<QueryOutcome, EngineError> {
        dispatch!(self, e => e.query(formula))
    }

    fn model(&mut self) -> Result<Assignment, EngineError> {
        dispatch!(self, e => e.model())
    }

    fn project(&mut self, model: &Assignment, term: &TermId) -> Result<String, EngineError> {
        dispatch!(self, e => e.project(model, term))
    }

    fn stringify(&self, term: &TermId) -> Result<String, EngineError> {
        dispatch!(self, e => e.stringify(term))
    }

    fn bit_width(&self, term: &TermId) -> Result<u32, EngineError> {
        dispatch!(self, e => e.bit_width(term))
    }
}
