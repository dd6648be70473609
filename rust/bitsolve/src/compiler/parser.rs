use crate::compiler::ast::*;
use crate::compiler::lexer::{LexError, Lexer};
use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected token {found} at line {line}, col {col}; expected {expected}")]
    Unexpected { found: String, expected: String, line: usize, col: usize },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expression nested too deeply at line {line}, col {col} (limit {})", MAX_NESTING)]
    TooDeep { line: usize, col: usize },
}

/// Binding power of prefix operators; tighter than every binary level.
const PREFIX_BP: u8 = 12;

/// Deepest expression tree accepted.  Parsing and lowering both recurse once
/// per level, and so does dropping the tree.
pub const MAX_NESTING: usize = 256;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).or_else(|| self.tokens.last())
    }

    fn peek_kind(&self) -> &TokenKind {
        self.current().map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    /// Consume the current token and return its span.
    fn advance(&mut self) -> Span {
        let span = self.current().map(|t| t.span).unwrap_or_else(Span::dummy);
        if self.pos < self.tokens.len() { self.pos += 1; }
        span
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(tok) if tok.kind != TokenKind::Eof => ParseError::Unexpected {
                found: format!("{}", tok.kind), expected: expected.into(),
                line: tok.span.line, col: tok.span.col,
            },
            _ => ParseError::UnexpectedEof,
        }
    }

    /// Height of a new node over children of height `height - 1`.
    fn nest(&self, height: usize, span: Span) -> Result<usize, ParseError> {
        if height > MAX_NESTING {
            return Err(ParseError::TooDeep { line: span.line, col: span.col });
        }
        Ok(height)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        match self.current() {
            Some(tok) if std::mem::discriminant(&tok.kind) == std::mem::discriminant(kind) => {
                let tok = tok.clone();
                self.advance();
                Ok(tok)
            }
            _ => Err(self.unexpected(&format!("{}", kind))),
        }
    }

    /// Parse one complete expression.  Anything left over is an error.
    pub fn parse_complete(&mut self) -> Result<Expr, ParseError> {
        let (expr, _) = self.parse_expr(0)?;
        if !matches!(self.peek_kind(), TokenKind::Eof) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    // ── Expressions ──
    //
    // Precedence levels, tightest first:
    //   5  * / % << >> & &^
    //   4  + - | ^
    //   3  == != < <= > >=
    //   2  &&
    //   1  ||

    /// Returns the expression with the height of its tree.
    fn parse_expr(&mut self, min_bp: u8) -> Result<(Expr, usize), ParseError> {
        self.depth += 1;
        let result = if self.depth > MAX_NESTING {
            let span = self.current().map(|t| t.span).unwrap_or_else(Span::dummy);
            Err(ParseError::TooDeep { line: span.line, col: span.col })
        } else {
            self.parse_binary(min_bp)
        };
        self.depth -= 1;
        result
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<(Expr, usize), ParseError> {
        let (mut lhs, mut height) = self.parse_prefix()?;
        loop {
            let (op, bp) = match self.peek_kind() {
                TokenKind::Star => (BinOp::Mul, (10, 11)),
                TokenKind::Slash => (BinOp::Div, (10, 11)),
                TokenKind::Percent => (BinOp::Mod, (10, 11)),
                TokenKind::Shl => (BinOp::Shl, (10, 11)),
                TokenKind::Shr => (BinOp::Shr, (10, 11)),
                TokenKind::Amp => (BinOp::BitAnd, (10, 11)),
                TokenKind::AmpCaret => (BinOp::AndNot, (10, 11)),
                TokenKind::Plus => (BinOp::Add, (8, 9)),
                TokenKind::Minus => (BinOp::Sub, (8, 9)),
                TokenKind::Pipe => (BinOp::BitOr, (8, 9)),
                TokenKind::Caret => (BinOp::BitXor, (8, 9)),
                TokenKind::Eq => (BinOp::Eq, (6, 7)),
                TokenKind::NotEq => (BinOp::NotEq, (6, 7)),
                TokenKind::Lt => (BinOp::Lt, (6, 7)),
                TokenKind::LtEq => (BinOp::LtEq, (6, 7)),
                TokenKind::Gt => (BinOp::Gt, (6, 7)),
                TokenKind::GtEq => (BinOp::GtEq, (6, 7)),
                TokenKind::AndAnd => (BinOp::And, (4, 5)),
                TokenKind::OrOr => (BinOp::Or, (2, 3)),
                _ => break,
            };
            let (l_bp, r_bp) = bp;
            if l_bp < min_bp { break; }
            self.advance();
            let (rhs, rhs_height) = self.parse_expr(r_bp)?;
            let span = lhs.span().merge(rhs.span());
            height = self.nest(height.max(rhs_height) + 1, span)?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs), span);
        }
        Ok((lhs, height))
    }

    fn parse_prefix(&mut self) -> Result<(Expr, usize), ParseError> {
        let unary = match self.peek_kind().clone() {
            TokenKind::IntLit(n) => {
                let s = self.advance();
                return Ok((Expr::IntLit(n, s), 1));
            }
            TokenKind::StringLit(sv) => {
                let s = self.advance();
                return Ok((Expr::StringLit(sv, s), 1));
            }
            TokenKind::Ident(name) => {
                let s = self.advance();
                return Ok((Expr::Ident(name, s), 1));
            }
            TokenKind::LParen => {
                let open = self.advance();
                let (inner, height) = self.parse_expr(0)?;
                let close = self.expect(&TokenKind::RParen)?;
                let span = open.merge(close.span);
                let height = self.nest(height + 1, span)?;
                return Ok((Expr::Paren(Box::new(inner), span), height));
            }
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Caret => UnaryOp::BitNot,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return Err(self.unexpected("expression")),
        };
        let s = self.advance();
        let (operand, height) = self.parse_expr(PREFIX_BP)?;
        let span = s.merge(operand.span());
        let height = self.nest(height + 1, span)?;
        Ok((Expr::UnaryOp(unary, Box::new(operand), span), height))
    }
}

/// Lex and parse a single surface expression.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_complete()
}
