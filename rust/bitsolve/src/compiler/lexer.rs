use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("unterminated string at line {line}, col {col}")]
    UnterminatedString { line: usize, col: usize },
    #[error("invalid number at line {line}, col {col}")]
    InvalidNumber { line: usize, col: usize },
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self { source: source.chars().collect(), pos: 0, line: 1, col: 1, byte_offset: 0 }
    }

    fn current(&self) -> Option<char> { self.source.get(self.pos).copied() }
    fn peek(&self) -> Option<char> { self.source.get(self.pos + 1).copied() }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' { self.line += 1; self.col = 1; } else { self.col += 1; }
        Some(ch)
    }

    fn span_here(&self) -> Span {
        Span::new(self.byte_offset, self.byte_offset, self.line, self.col)
    }

    fn span_from(&self, so: usize, sl: usize, sc: usize) -> Span {
        Span::new(so, self.byte_offset, sl, sc)
    }

    fn read_string(&mut self) -> Result<Token, LexError> {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None | Some('\n') => return Err(LexError::UnterminatedString { line: sl, col: sc }),
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => { s.push('\n'); self.advance(); }
                        Some('t') => { s.push('\t'); self.advance(); }
                        Some('\\') => { s.push('\\'); self.advance(); }
                        Some('"') => { s.push('"'); self.advance(); }
                        Some(c) => { s.push('\\'); s.push(c); self.advance(); }
                        None => return Err(LexError::UnterminatedString { line: sl, col: sc }),
                    }
                }
                Some('"') => { self.advance(); break; }
                Some(c) => { s.push(c); self.advance(); }
            }
        }
        Ok(Token::new(TokenKind::StringLit(s), self.span_from(so, sl, sc)))
    }

    /// Decimal, `0x`, `0o` or `0b` integer with optional `_` separators.
    /// A decimal with a leading zero (`010`) is rejected rather than read as
    /// either octal or decimal.
    fn read_number(&mut self) -> Result<Token, LexError> {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        let radix = match (self.current(), self.peek()) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('o' | 'O')) => 8,
            (Some('0'), Some('b' | 'B')) => 2,
            _ => 10,
        };
        if radix != 10 { self.advance(); self.advance(); }

        let mut ns = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() { ns.push(ch); self.advance(); }
            else if ch == '_' { self.advance(); }
            else { break; }
        }
        let span = self.span_from(so, sl, sc);
        if ns.is_empty() || (radix == 10 && ns.len() > 1 && ns.starts_with('0')) {
            return Err(LexError::InvalidNumber { line: sl, col: sc });
        }
        u64::from_str_radix(&ns, radix)
            .map(|n| Token::new(TokenKind::IntLit(n), span))
            .map_err(|_| LexError::InvalidNumber { line: sl, col: sc })
    }

    fn read_ident(&mut self) -> Token {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        let mut id = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' { id.push(ch); self.advance(); } else { break; }
        }
        Token::new(TokenKind::Ident(id), self.span_from(so, sl, sc))
    }

    fn two_char(&mut self, second: char, matched: TokenKind, single: TokenKind) -> Token {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        self.advance();
        if self.current() == Some(second) { self.advance(); Token::new(matched, self.span_from(so, sl, sc)) }
        else { Token::new(single, self.span_from(so, sl, sc)) }
    }

    /// `<`, `<=`, `<<` and the `>` family share a first character.
    fn angle(&mut self, first: char) -> Token {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        self.advance();
        let (single, with_eq, doubled) = if first == '<' {
            (TokenKind::Lt, TokenKind::LtEq, TokenKind::Shl)
        } else {
            (TokenKind::Gt, TokenKind::GtEq, TokenKind::Shr)
        };
        let kind = match self.current() {
            Some('=') => { self.advance(); with_eq }
            Some(c) if c == first => { self.advance(); doubled }
            _ => single,
        };
        Token::new(kind, self.span_from(so, sl, sc))
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        self.advance();
        Token::new(kind, self.span_from(so, sl, sc))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.current() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => { self.advance(); }
                '"' => tokens.push(self.read_string()?),
                '0'..='9' => tokens.push(self.read_number()?),
                c if c.is_alphabetic() || c == '_' => tokens.push(self.read_ident()),
                '+' => tokens.push(self.single(TokenKind::Plus)),
                '-' => tokens.push(self.single(TokenKind::Minus)),
                '*' => tokens.push(self.single(TokenKind::Star)),
                '/' => tokens.push(self.single(TokenKind::Slash)),
                '%' => tokens.push(self.single(TokenKind::Percent)),
                '^' => tokens.push(self.single(TokenKind::Caret)),
                '(' => tokens.push(self.single(TokenKind::LParen)),
                ')' => tokens.push(self.single(TokenKind::RParen)),
                '|' => tokens.push(self.two_char('|', TokenKind::OrOr, TokenKind::Pipe)),
                '!' => tokens.push(self.two_char('=', TokenKind::NotEq, TokenKind::Bang)),
                '<' | '>' => tokens.push(self.angle(ch)),
                '&' => {
                    let (so, sl, sc) = (self.byte_offset, self.line, self.col);
                    self.advance();
                    let kind = match self.current() {
                        Some('&') => { self.advance(); TokenKind::AndAnd }
                        Some('^') => { self.advance(); TokenKind::AmpCaret }
                        _ => TokenKind::Amp,
                    };
                    tokens.push(Token::new(kind, self.span_from(so, sl, sc)));
                }
                '=' => {
                    let (so, sl, sc) = (self.byte_offset, self.line, self.col);
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        tokens.push(Token::new(TokenKind::Eq, self.span_from(so, sl, sc)));
                    } else {
                        return Err(LexError::UnexpectedChar { ch: '=', line: sl, col: sc });
                    }
                }
                _ => return Err(LexError::UnexpectedChar { ch, line: self.line, col: self.col }),
            }
        }
        tokens.push(Token::new(TokenKind::Eof, self.span_here()));
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            kinds("a << 2 >= b && !c || d &^ e != f"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Shl,
                TokenKind::IntLit(2),
                TokenKind::GtEq,
                TokenKind::Ident("b".into()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("c".into()),
                TokenKind::OrOr,
                TokenKind::Ident("d".into()),
                TokenKind::AmpCaret,
                TokenKind::Ident("e".into()),
                TokenKind::NotEq,
                TokenKind::Ident("f".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_radix_literals() {
        assert_eq!(
            kinds("0xFF 0o17 0b1010 1_000 0 0x007"),
            vec![
                TokenKind::IntLit(255),
                TokenKind::IntLit(15),
                TokenKind::IntLit(10),
                TokenKind::IntLit(1000),
                TokenKind::IntLit(0),
                TokenKind::IntLit(7),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_invalid_numbers() {
        assert!(matches!(Lexer::new("0x").tokenize(), Err(LexError::InvalidNumber { line: 1, col: 1 })));
        assert!(matches!(Lexer::new("12ab").tokenize(), Err(LexError::InvalidNumber { .. })));
        assert!(matches!(
            Lexer::new("18446744073709551616").tokenize(),
            Err(LexError::InvalidNumber { .. })
        ));
        assert_eq!(kinds("18446744073709551615")[0], TokenKind::IntLit(u64::MAX));
    }

    #[test]
    fn test_lex_leading_zero_decimal_is_rejected() {
        for src in ["010", "09", "00", "0_1"] {
            assert!(
                matches!(Lexer::new(src).tokenize(), Err(LexError::InvalidNumber { line: 1, col: 1 })),
                "{}",
                src
            );
        }
        assert!(matches!(
            Lexer::new("x == 010").tokenize(),
            Err(LexError::InvalidNumber { line: 1, col: 6 })
        ));
    }

    #[test]
    fn test_lex_string_and_errors() {
        assert_eq!(kinds("\"hi\\n\"")[0], TokenKind::StringLit("hi\n".into()));
        assert!(matches!(Lexer::new("\"open").tokenize(), Err(LexError::UnterminatedString { .. })));
        assert!(matches!(
            Lexer::new("a = b").tokenize(),
            Err(LexError::UnexpectedChar { ch: '=', line: 1, col: 3 })
        ));
        assert!(matches!(Lexer::new("a $ b").tokenize(), Err(LexError::UnexpectedChar { ch: '$', .. })));
    }

    #[test]
    fn test_lex_spans() {
        let toks = Lexer::new("x <= 10").tokenize().unwrap();
        assert_eq!(toks[1].span, Span::new(2, 4, 1, 3));
        assert_eq!(toks[2].span, Span::new(5, 7, 1, 6));
    }
}
