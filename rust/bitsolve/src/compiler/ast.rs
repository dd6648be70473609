use crate::compiler::tokens::Span;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

/// Parsed surface expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    IntLit(u64, Span),
    StringLit(String, Span),
    Ident(String, Span),
    /// Explicit parentheses.  Kept as a node because `!(x)` and `!x` lower
    /// differently.
    Paren(Box<Expr>, Span),
    UnaryOp(UnaryOp, Box<Expr>, Span),
    BinOp(Box<Expr>, BinOp, Box<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit(_, s) => *s,
            Expr::StringLit(_, s) => *s,
            Expr::Ident(_, s) => *s,
            Expr::Paren(_, s) => *s,
            Expr::UnaryOp(_, _, s) => *s,
            Expr::BinOp(_, _, _, s) => *s,
        }
    }

    // ── Builders ──
    //
    // For constructing trees in code; spans are left as dummies.

    pub fn int(value: u64) -> Expr {
        Expr::IntLit(value, Span::dummy())
    }

    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(name.into(), Span::dummy())
    }

    pub fn paren(inner: Expr) -> Expr {
        Expr::Paren(Box::new(inner), Span::dummy())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::UnaryOp(op, Box::new(operand), Span::dummy())
    }

    pub fn binary(lhs: Expr, op: BinOp, rhs: Expr) -> Expr {
        Expr::BinOp(Box::new(lhs), op, Box::new(rhs), Span::dummy())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr, EnumIter,
)]
pub enum BinOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "&^")]
    AndNot,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtEq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtEq,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr, EnumIter,
)]
pub enum UnaryOp {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Neg,
    /// `^x`
    #[strum(serialize = "^")]
    BitNot,
    #[strum(serialize = "+")]
    Plus,
}
