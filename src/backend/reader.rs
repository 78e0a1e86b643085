//! The S-expression reader: token stream in, cell trees out.
//!
//! `#NULL`, `#T`, and `#F` map to the singleton cells; quote sugar expands
//! to `(QUOTE x)` and friends; `[` and `]` delimit lists like parentheses;
//! a dotted tail ends a list. End of input at top level reads as the eof
//! object.

use tracing::warn;

use super::cell::{Cell, CellRef, PortDir};
use super::error::{EvalResult, SchemeError};
use super::interp::Interp;
use crate::scanner::Token;

impl Interp {
    /// Read the next datum from an input port cell. Returns the eof object
    /// at end of input.
    pub fn read(&mut self, port: CellRef) -> EvalResult<CellRef> {
        let (slot, dir) = self
            .port_info(port)
            .ok_or_else(|| SchemeError::Runtime("READ: Arg must be a port.".to_string()))?;
        if dir != PortDir::Input {
            return Err(SchemeError::Runtime("READ: Port must be an input port.".to_string()));
        }
        match self.read_value(slot)? {
            Some(datum) => Ok(datum),
            None => Err(SchemeError::Syntax("Unexpected list terminator".to_string())),
        }
    }

    /// Read one datum; `None` means the next token closes a list (the
    /// token is pushed back for the list reader).
    fn read_value(&mut self, slot: usize) -> EvalResult<Option<CellRef>> {
        let tok = self.next_token(slot)?;
        match tok {
            Token::Eof => Ok(Some(self.eof)),
            Token::RParen | Token::RBracket => {
                self.put_back(tok);
                Ok(None)
            }
            Token::LParen => self.read_list(slot, Token::RParen).map(Some),
            Token::LBracket => self.read_list(slot, Token::RBracket).map(Some),
            Token::Quote => self.read_quoted(slot, "QUOTE").map(Some),
            Token::Quasiquote => self.read_quoted(slot, "QUASIQUOTE").map(Some),
            Token::Unquote => self.read_quoted(slot, "UNQUOTE").map(Some),
            Token::UnquoteSplice => self.read_quoted(slot, "UNQUOTE-SPLICE").map(Some),
            Token::VectorOpen(count) => self.read_vector(slot, count).map(Some),
            Token::Int(i) => Ok(Some(self.int(i))),
            Token::Float(x) => Ok(Some(self.float(x))),
            Token::Char(c) => Ok(Some(self.char_cell(c))),
            Token::Str(s) => Ok(Some(self.string(s))),
            Token::Sym(name) => match name.as_str() {
                "#NULL" => Ok(Some(self.nil)),
                "#T" => Ok(Some(self.t)),
                "#F" => Ok(Some(self.f)),
                _ => Ok(Some(self.symbol(&name)?)),
            },
            Token::Dot => Err(SchemeError::Syntax("Misplaced dot!".to_string())),
        }
    }

    fn read_list(&mut self, slot: usize, end: Token) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        let head = self.reg_push(self.nil);
        let tail = self.reg_push(self.nil);

        loop {
            let tok = self.next_token(slot)?;
            if tok == end {
                break;
            }
            match tok {
                Token::Eof => {
                    return Err(SchemeError::Syntax("Unexpected end of input.".to_string()))
                }
                Token::RParen | Token::RBracket => {
                    return Err(SchemeError::Syntax("Mismatched list terminator".to_string()))
                }
                Token::Dot => {
                    if self.is_nil(self.reg(head)) {
                        return Err(SchemeError::Syntax("Misplaced dot!".to_string()));
                    }
                    let datum = self
                        .read_value(slot)?
                        .ok_or_else(|| SchemeError::Syntax("Misplaced dot!".to_string()))?;
                    let t = self.reg(tail);
                    self.set_cdr(t, datum)?;
                    // The dotted tail must close the list; skip to the
                    // terminator otherwise.
                    let next = self.next_token(slot)?;
                    if next != end {
                        warn!(target: "schemetron::eval", "Misplaced dot.  Elements skipped.");
                        let mut skip = next;
                        while skip != end && skip != Token::Eof {
                            skip = self.next_token(slot)?;
                        }
                    }
                    break;
                }
                other => {
                    self.put_back(other);
                    let datum = match self.read_value(slot)? {
                        Some(d) => d,
                        None => {
                            return Err(SchemeError::Syntax(
                                "Mismatched list terminator".to_string(),
                            ))
                        }
                    };
                    let link = self.cons(datum, self.nil);
                    if self.is_nil(self.reg(head)) {
                        self.set_reg(head, link);
                    } else {
                        let t = self.reg(tail);
                        self.set_cdr(t, link)?;
                    }
                    self.set_reg(tail, link);
                }
            }
        }

        let list = self.reg(head);
        self.reg_release(rm);
        Ok(list)
    }

    fn read_quoted(&mut self, slot: usize, name: &str) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        let sym = self.symbol(name)?;
        self.reg_push(sym);
        let datum = self
            .read_value(slot)?
            .ok_or_else(|| SchemeError::Syntax("Unexpected end of input.".to_string()))?;
        let inner = self.cons(datum, self.nil);
        let quoted = self.cons(sym, inner);
        self.reg_release(rm);
        Ok(quoted)
    }

    fn read_vector(&mut self, slot: usize, declared: Option<usize>) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        match declared {
            None => {
                // Unknown element count: collect on the register stack.
                let base = self.reg_mark();
                let mut count = 0;
                loop {
                    match self.read_value(slot)? {
                        Some(d) if d == self.eof => {
                            return Err(SchemeError::Syntax(
                                "Unexpected end of input.".to_string(),
                            ))
                        }
                        Some(d) => {
                            self.reg_push(d);
                            count += 1;
                        }
                        None => break,
                    }
                }
                self.expect_close(slot)?;
                let elems: Vec<CellRef> = (0..count).map(|i| self.reg(base + i)).collect();
                let v = self.alloc(Cell::Vector(elems));
                self.reg_release(rm);
                Ok(v)
            }
            Some(n) => {
                // Declared size: read up to n elements, pad with ().
                let v_slot = self.reg_push(self.nil);
                let v = self.alloc(Cell::Vector(vec![self.nil; n]));
                self.set_reg(v_slot, v);
                for i in 0..n {
                    match self.read_value(slot)? {
                        Some(d) if d == self.eof => {
                            return Err(SchemeError::Syntax(
                                "Unexpected end of input.".to_string(),
                            ))
                        }
                        Some(d) => {
                            let dst = self.reg(v_slot);
                            match self.heap.get_mut(dst) {
                                Cell::Vector(elems) => elems[i] = d,
                                _ => unreachable!("vector changed kind during read"),
                            }
                        }
                        None => break,
                    }
                }
                self.expect_close(slot)?;
                let v = self.reg(v_slot);
                self.reg_release(rm);
                Ok(v)
            }
        }
    }

    fn expect_close(&mut self, slot: usize) -> EvalResult<()> {
        let tok = self.next_token(slot)?;
        if tok == Token::RParen {
            Ok(())
        } else {
            Err(SchemeError::Syntax("Vector syntax error".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ports::PortState;

    fn read_back(src: &str) -> String {
        let mut it = Interp::new().unwrap();
        let port = it.add_port(PortState::from_string(src), PortDir::Input);
        it.reg_push(port);
        let datum = it.read(port).unwrap();
        it.write_string(datum)
    }

    fn read_err(src: &str) -> SchemeError {
        let mut it = Interp::new().unwrap();
        let port = it.add_port(PortState::from_string(src), PortDir::Input);
        it.reg_push(port);
        it.read(port).unwrap_err()
    }

    #[test]
    fn test_atoms() {
        assert_eq!(read_back("42"), "42");
        assert_eq!(read_back("-3.5"), "-3.5");
        assert_eq!(read_back("foo"), "FOO");
        assert_eq!(read_back("\"s\""), "\"s\"");
        assert_eq!(read_back("#\\space"), "#\\space");
        assert_eq!(read_back("#T"), "#T");
        assert_eq!(read_back("#F"), "#F");
        assert_eq!(read_back("#NULL"), "()");
    }

    #[test]
    fn test_lists() {
        assert_eq!(read_back("(1 2 3)"), "(1 2 3)");
        assert_eq!(read_back("()"), "()");
        assert_eq!(read_back("(a (b c) d)"), "(A (B C) D)");
        assert_eq!(read_back("[a b]"), "(A B)");
    }

    #[test]
    fn test_dotted_pairs() {
        assert_eq!(read_back("(1 . 2)"), "(1 . 2)");
        assert_eq!(read_back("(1 2 . 3)"), "(1 2 . 3)");
    }

    #[test]
    fn test_quote_sugar() {
        assert_eq!(read_back("'x"), "(QUOTE X)");
        assert_eq!(read_back("`x"), "(QUASIQUOTE X)");
        assert_eq!(read_back(",x"), "(UNQUOTE X)");
        assert_eq!(read_back(",@x"), "(UNQUOTE-SPLICE X)");
        assert_eq!(read_back("''x"), "(QUOTE (QUOTE X))");
    }

    #[test]
    fn test_vectors() {
        assert_eq!(read_back("#(1 2 3)"), "#(1 2 3)");
        assert_eq!(read_back("#()"), "#()");
        assert_eq!(read_back("#3(1)"), "#(1 () ())");
        assert_eq!(read_back("#(#(1) 2)"), "#(#(1) 2)");
    }

    #[test]
    fn test_eof_reads_as_eof_object() {
        assert_eq!(read_back("   ; just a comment"), "#EOF");
    }

    #[test]
    fn test_unterminated_list_errors() {
        assert!(matches!(read_err("(1 2"), SchemeError::Syntax(_)));
    }

    #[test]
    fn test_stray_terminator_errors() {
        assert!(matches!(read_err(")"), SchemeError::Syntax(_)));
    }

    #[test]
    fn test_misplaced_dot_errors() {
        assert!(matches!(read_err("(. 1)"), SchemeError::Syntax(_)));
    }

    #[test]
    fn test_read_write_round_trip() {
        let cases = [
            "42",
            "-17",
            "2.5",
            "FOO",
            "\"a string\"",
            "#\\a",
            "#\\space",
            "#T",
            "#F",
            "()",
            "(1 2 3)",
            "(1 . 2)",
            "(A (B (C)) . D)",
            "#(1 #\\b \"c\" (d))",
            "(QUOTE X)",
        ];
        for src in cases {
            assert_eq!(read_back(src), src, "round trip failed for {}", src);
        }
    }
}
