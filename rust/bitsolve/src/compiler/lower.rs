//! AST → engine term lowering.
//!
//! The engine has no static types beyond its sort check, so the lowering is
//! where width and domain are decided:
//!
//! - literals take the registry's default width;
//! - arithmetic and shift operators take the width of their left operand, as
//!   reported by the engine;
//! - unary `!` is a bitvector NOT on a bare identifier and a boolean NOT on
//!   anything else (see [`NotOperand`]).

use bitsolve_engine::{Engine, TermOp};

use crate::compiler::ast::*;
use crate::compiler::CompileError;
use crate::registry::Registry;

/// Which negation a unary `!` lowers to, decided from the operand's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotOperand {
    /// `!x`: bitwise complement of the variable.
    BareIdentifier,
    /// `!(x)`, `!(a < b)`, `!!x`, ...: boolean negation.
    Compound,
}

impl NotOperand {
    pub fn classify(operand: &Expr) -> Self {
        match operand {
            Expr::Ident(..) => NotOperand::BareIdentifier,
            _ => NotOperand::Compound,
        }
    }
}

/// How a binary operator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Bitvector arithmetic or shift at the left operand's width.
    Sized(TermOp),
    /// Bitwise operator; the engine infers the width.
    Bitwise(TermOp),
    /// Boolean connective.
    Logical(TermOp),
    /// Unsigned comparison.
    Compare(TermOp),
    Equal,
    NotEqual,
}

impl Dispatch {
    /// `None` for operators the engine has no counterpart for.
    pub fn classify(op: BinOp) -> Option<Self> {
        Some(match op {
            BinOp::Add => Dispatch::Sized(TermOp::BvAdd),
            BinOp::Sub => Dispatch::Sized(TermOp::BvSub),
            BinOp::Mul => Dispatch::Sized(TermOp::BvMul),
            BinOp::Div => Dispatch::Sized(TermOp::BvDiv),
            BinOp::Mod => Dispatch::Sized(TermOp::BvMod),
            BinOp::Shl => Dispatch::Sized(TermOp::BvShl),
            BinOp::Shr => Dispatch::Sized(TermOp::BvLshr),
            BinOp::BitAnd => Dispatch::Bitwise(TermOp::BvAnd),
            BinOp::BitOr => Dispatch::Bitwise(TermOp::BvOr),
            BinOp::BitXor => Dispatch::Bitwise(TermOp::BvXor),
            BinOp::And => Dispatch::Logical(TermOp::And),
            BinOp::Or => Dispatch::Logical(TermOp::Or),
            BinOp::Lt => Dispatch::Compare(TermOp::BvUlt),
            BinOp::Gt => Dispatch::Compare(TermOp::BvUgt),
            BinOp::LtEq => Dispatch::Compare(TermOp::BvUle),
            BinOp::GtEq => Dispatch::Compare(TermOp::BvUge),
            BinOp::Eq => Dispatch::Equal,
            BinOp::NotEq => Dispatch::NotEqual,
            BinOp::AndNot => return None,
        })
    }
}

/// `"a"`, `("a")`, ...
fn is_string(expr: &Expr) -> bool {
    match expr {
        Expr::StringLit(..) => true,
        Expr::Paren(inner, _) => is_string(inner),
        _ => false,
    }
}

/// Lowers expressions into terms of one engine context.
pub struct Lowerer<'a, E: Engine> {
    engine: &'a mut E,
    registry: &'a Registry<E::Term>,
}

impl<'a, E: Engine> Lowerer<'a, E> {
    pub fn new(engine: &'a mut E, registry: &'a Registry<E::Term>) -> Self {
        Self { engine, registry }
    }

    pub fn lower(&mut self, expr: &Expr) -> Result<E::Term, CompileError> {
        match expr {
            Expr::Paren(inner, _) => self.lower(inner),
            Expr::IntLit(value, _) => self.literal(*value),
            Expr::StringLit(s, span) => Err(CompileError::UnsupportedLiteral {
                literal: format!("{:?}", s),
                line: span.line,
                col: span.col,
            }),
            Expr::Ident(name, _) => self.registry.resolve(name),
            Expr::UnaryOp(op, operand, span) => self.unary(*op, operand, *span),
            Expr::BinOp(lhs, op, rhs, span) => self.binary(lhs, *op, rhs, *span),
        }
    }

    fn literal(&mut self, value: u64) -> Result<E::Term, CompileError> {
        let width = self.registry.default_width();
        // A zero width is left for the engine to reject.
        if (1..64).contains(&width) && value >> width != 0 {
            return Err(CompileError::LiteralOverflow { value, width });
        }
        Ok(self.engine.build_constant(width, value)?)
    }

    fn unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        span: crate::compiler::tokens::Span,
    ) -> Result<E::Term, CompileError> {
        match op {
            UnaryOp::Not => {
                let term = self.lower(operand)?;
                let negation = match NotOperand::classify(operand) {
                    NotOperand::BareIdentifier => TermOp::BvNot,
                    NotOperand::Compound => TermOp::Not,
                };
                Ok(self.engine.build_term(negation, None, &[term])?)
            }
            UnaryOp::Neg => {
                let term = self.lower(operand)?;
                Ok(self.engine.build_term(TermOp::BvNeg, None, &[term])?)
            }
            UnaryOp::BitNot | UnaryOp::Plus => Err(CompileError::UnsupportedOperator {
                op: format!("unary {}", op),
                line: span.line,
                col: span.col,
            }),
        }
    }

    fn binary(
        &mut self,
        lhs: &Expr,
        op: BinOp,
        rhs: &Expr,
        span: crate::compiler::tokens::Span,
    ) -> Result<E::Term, CompileError> {
        let dispatch = Dispatch::classify(op).ok_or_else(|| CompileError::UnsupportedOperator {
            op: op.to_string(),
            line: span.line,
            col: span.col,
        })?;
        // No operator is defined on strings, concatenation included.
        if is_string(lhs) || is_string(rhs) {
            return Err(CompileError::UnsupportedOperator {
                op: format!("{} on strings", op),
                line: span.line,
                col: span.col,
            });
        }
        let left = self.lower(lhs)?;
        let right = self.lower(rhs)?;
        let operands = [left, right];

        let term = match dispatch {
            Dispatch::Sized(term_op) => {
                let width = self.engine.bit_width(&operands[0])?;
                self.engine.build_term(term_op, Some(width), &operands)?
            }
            Dispatch::Bitwise(term_op)
            | Dispatch::Logical(term_op)
            | Dispatch::Compare(term_op) => self.engine.build_term(term_op, None, &operands)?,
            Dispatch::Equal => self.engine.build_term(TermOp::Eq, None, &operands)?,
            Dispatch::NotEqual => {
                let eq = self.engine.build_term(TermOp::Eq, None, &operands)?;
                self.engine.build_term(TermOp::Not, None, &[eq])?
            }
        };
        Ok(term)
    }
}
