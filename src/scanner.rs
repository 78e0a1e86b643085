//! Lexical scanner for Scheme source text.
//!
//! Operates on bytes pulled from a port, one token of lookahead. Unquoted
//! symbols are case-folded to upper. Comments run from `;` to end of line.
//! `#(` and `#N(` introduce vectors, `#\x` characters; any other
//! `#`-prefixed atom scans as a symbol (`#T`, `#F`, `#NULL`), which the
//! reader maps onto singletons.

use std::fmt;

use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplice,
    Dot,
    Int(i64),
    Float(f64),
    Sym(String),
    Str(String),
    Char(char),
    /// `#(` with an optional pre-declared element count for `#N(`
    VectorOpen(Option<usize>),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Quote => write!(f, "'"),
            Token::Quasiquote => write!(f, "`"),
            Token::Unquote => write!(f, ","),
            Token::UnquoteSplice => write!(f, ",@"),
            Token::Dot => write!(f, "."),
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::Sym(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Char(c) => write!(f, "#\\{}", c),
            Token::VectorOpen(None) => write!(f, "#("),
            Token::VectorOpen(Some(n)) => write!(f, "#{}(", n),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// One-token pushback state, shared by every port the reader touches.
/// A put-back token is always consumed before the next port is read.
pub struct Scanner {
    pushback: Option<Token>,
}

impl Scanner {
    pub fn new() -> Self {
        Self { pushback: None }
    }

    pub fn reset(&mut self) {
        self.pushback = None;
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes that terminate an atom.
fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'[' | b']' | b';' | b'"')
}

impl Interp {
    /// Hand a token back; the next `next_token` returns it.
    pub(crate) fn put_back(&mut self, tok: Token) {
        self.scanner.pushback = Some(tok);
    }

    /// Scan the next token from the port in `slot`.
    pub(crate) fn next_token(&mut self, slot: usize) -> EvalResult<Token> {
        if let Some(tok) = self.scanner.pushback.take() {
            return Ok(tok);
        }

        // Skip whitespace and comments.
        let ch = loop {
            match self.port_state(slot)?.getc()? {
                None => return Ok(Token::Eof),
                Some(b) if b.is_ascii_whitespace() => continue,
                Some(b';') => loop {
                    match self.port_state(slot)?.getc()? {
                        None => return Ok(Token::Eof),
                        Some(b'\n') => break,
                        Some(_) => continue,
                    }
                },
                Some(b) => break b,
            }
        };

        match ch {
            b'(' => Ok(Token::LParen),
            b')' => Ok(Token::RParen),
            b'[' => Ok(Token::LBracket),
            b']' => Ok(Token::RBracket),
            b'\'' => Ok(Token::Quote),
            b'`' => Ok(Token::Quasiquote),
            b',' => match self.port_state(slot)?.getc()? {
                Some(b'@') => Ok(Token::UnquoteSplice),
                Some(b) => {
                    self.port_state(slot)?.ungetc(b);
                    Ok(Token::Unquote)
                }
                None => Ok(Token::Unquote),
            },
            b'"' => self.scan_string(slot),
            b'#' => self.scan_hash(slot),
            first => self.scan_atom(slot, first),
        }
    }

    fn scan_string(&mut self, slot: usize) -> EvalResult<Token> {
        let mut text = String::new();
        loop {
            match self.port_state(slot)?.getc()? {
                None => return Err(SchemeError::Syntax("Unclosed string literal".to_string())),
                Some(b'"') => return Ok(Token::Str(text)),
                Some(b'\\') => match self.port_state(slot)?.getc()? {
                    None => {
                        return Err(SchemeError::Syntax("Unexpected end of string".to_string()))
                    }
                    Some(b'n') => text.push('\n'),
                    Some(b't') => text.push('\t'),
                    Some(b) => text.push(b as char),
                },
                Some(b) => text.push(b as char),
            }
        }
    }

    fn scan_hash(&mut self, slot: usize) -> EvalResult<Token> {
        match self.port_state(slot)?.getc()? {
            None => self.scan_atom_text(slot, "#".to_string()),
            Some(b'\\') => self.scan_char(slot),
            Some(b'(') => Ok(Token::VectorOpen(None)),
            Some(b) if b.is_ascii_digit() => {
                let mut n = (b - b'0') as usize;
                loop {
                    match self.port_state(slot)?.getc()? {
                        Some(d) if d.is_ascii_digit() => n = n * 10 + (d - b'0') as usize,
                        Some(b'(') => return Ok(Token::VectorOpen(Some(n))),
                        _ => {
                            return Err(SchemeError::Syntax(
                                "Malformed vector literal".to_string(),
                            ))
                        }
                    }
                }
            }
            Some(b) => {
                self.port_state(slot)?.ungetc(b);
                self.scan_atom_text(slot, "#".to_string())
            }
        }
    }

    fn scan_char(&mut self, slot: usize) -> EvalResult<Token> {
        let first = match self.port_state(slot)?.getc()? {
            None => return Err(SchemeError::Syntax("Unterminated character literal".to_string())),
            Some(b) => b,
        };
        let mut name = String::new();
        name.push(first as char);
        loop {
            match self.port_state(slot)?.getc()? {
                None => break,
                Some(b) if is_delimiter(b) => {
                    self.port_state(slot)?.ungetc(b);
                    break;
                }
                Some(b) => name.push(b as char),
            }
        }
        if name.len() == 1 {
            return Ok(Token::Char(first as char));
        }
        match name.to_ascii_lowercase().as_str() {
            "space" => Ok(Token::Char(' ')),
            "newline" => Ok(Token::Char('\n')),
            "tab" => Ok(Token::Char('\t')),
            other => Err(SchemeError::Syntax(format!("Unknown character name #\\{}", other))),
        }
    }

    fn scan_atom(&mut self, slot: usize, first: u8) -> EvalResult<Token> {
        let mut text = String::new();
        text.push(first as char);
        self.scan_atom_text(slot, text)
    }

    fn scan_atom_text(&mut self, slot: usize, mut text: String) -> EvalResult<Token> {
        loop {
            match self.port_state(slot)?.getc()? {
                None => break,
                Some(b) if is_delimiter(b) => {
                    self.port_state(slot)?.ungetc(b);
                    break;
                }
                Some(b) => text.push(b as char),
            }
        }
        if text == "." {
            return Ok(Token::Dot);
        }
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Token::Int(i));
        }
        if text.starts_with(|c: char| c.is_ascii_digit() || c == '+' || c == '-' || c == '.')
            && text.len() > 1
        {
            if let Ok(x) = text.parse::<f64>() {
                return Ok(Token::Float(x));
            }
        }
        Ok(Token::Sym(text.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cell::PortDir;
    use crate::backend::ports::PortState;

    fn tokens(src: &str) -> Vec<Token> {
        let mut it = Interp::new().unwrap();
        let port = it.add_port(PortState::from_string(src), PortDir::Input);
        let rm = it.reg_mark();
        it.reg_push(port);
        let (slot, _) = it.port_info(port).unwrap();
        let mut out = Vec::new();
        loop {
            let tok = it.next_token(slot).unwrap();
            if tok == Token::Eof {
                break;
            }
            out.push(tok);
        }
        it.reg_release(rm);
        out
    }

    #[test]
    fn test_parens_and_symbols() {
        assert_eq!(
            tokens("(car x)"),
            vec![
                Token::LParen,
                Token::Sym("CAR".to_string()),
                Token::Sym("X".to_string()),
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_symbols_fold_to_upper() {
        assert_eq!(tokens("fOo"), vec![Token::Sym("FOO".to_string())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 -7 3.5"),
            vec![Token::Int(42), Token::Int(-7), Token::Float(3.5)]
        );
    }

    #[test]
    fn test_signs_alone_are_symbols() {
        assert_eq!(
            tokens("+ -"),
            vec![Token::Sym("+".to_string()), Token::Sym("-".to_string())]
        );
    }

    #[test]
    fn test_quote_sugar() {
        assert_eq!(
            tokens("'a `b ,c ,@d"),
            vec![
                Token::Quote,
                Token::Sym("A".to_string()),
                Token::Quasiquote,
                Token::Sym("B".to_string()),
                Token::Unquote,
                Token::Sym("C".to_string()),
                Token::UnquoteSplice,
                Token::Sym("D".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\nb\"c""#),
            vec![Token::Str("a\nb\"c".to_string())]
        );
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(
            tokens(r"#\a #\space #\newline"),
            vec![Token::Char('a'), Token::Char(' '), Token::Char('\n')]
        );
    }

    #[test]
    fn test_vector_open() {
        assert_eq!(tokens("#(")[0], Token::VectorOpen(None));
        assert_eq!(tokens("#3(")[0], Token::VectorOpen(Some(3)));
    }

    #[test]
    fn test_hash_atoms_scan_as_symbols() {
        assert_eq!(
            tokens("#T #NULL"),
            vec![Token::Sym("#T".to_string()), Token::Sym("#NULL".to_string())]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(tokens("; nothing\n12 ; trailing\n"), vec![Token::Int(12)]);
    }

    #[test]
    fn test_dot_and_brackets() {
        assert_eq!(
            tokens("[a . b]"),
            vec![
                Token::LBracket,
                Token::Sym("A".to_string()),
                Token::Dot,
                Token::Sym("B".to_string()),
                Token::RBracket
            ]
        );
    }
}
