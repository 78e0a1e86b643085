//! Rendering values as text.
//!
//! `write` produces machine-readable forms (strings quoted and escaped,
//! characters as `#\x`); `display` produces human-readable ones. Opaque
//! machine values print as `#<...>` descriptions.

use itertools::Itertools;

use super::cell::{Cell, CellRef};
use super::interp::Interp;
use super::ops;

impl Interp {
    /// Machine-readable rendering (`write`).
    pub fn write_string(&self, r: CellRef) -> String {
        let mut out = String::new();
        self.emit(r, false, &mut out);
        out
    }

    /// Human-readable rendering (`display`).
    pub fn display_string(&self, r: CellRef) -> String {
        let mut out = String::new();
        self.emit(r, true, &mut out);
        out
    }

    fn emit(&self, r: CellRef, display: bool, out: &mut String) {
        if self.is_atom(r) {
            self.emit_atom(r, display, out);
            return;
        }

        out.push('(');
        let mut curr = r;
        loop {
            self.emit(self.car(curr), display, out);
            curr = self.cdr(curr);
            if self.is_nil(curr) {
                break;
            }
            if !self.is_pair(curr) {
                out.push_str(" . ");
                self.emit_atom(curr, display, out);
                break;
            }
            out.push(' ');
        }
        out.push(')');
    }

    fn emit_atom(&self, r: CellRef, display: bool, out: &mut String) {
        match self.cell(r) {
            Cell::Nil => out.push_str("()"),
            Cell::True => out.push_str("#T"),
            Cell::False => out.push_str("#F"),
            Cell::Eof => out.push_str("#EOF"),
            Cell::Symbol(id) => out.push_str(self.symbols.name(*id)),
            Cell::Int(i) => out.push_str(&i.to_string()),
            Cell::Float(x) => {
                // Keep a decimal point so floats re-read as floats.
                if x.fract() == 0.0 && x.is_finite() {
                    out.push_str(&format!("{:.1}", x));
                } else {
                    out.push_str(&x.to_string());
                }
            }
            Cell::Str(s) => {
                if display {
                    out.push_str(s);
                } else {
                    out.push('"');
                    for c in s.chars() {
                        match c {
                            '"' => out.push_str("\\\""),
                            '\\' => out.push_str("\\\\"),
                            c => out.push(c),
                        }
                    }
                    out.push('"');
                }
            }
            Cell::Char(c) => {
                if display {
                    out.push(*c);
                } else {
                    match c {
                        '\n' => out.push_str("#\\newline"),
                        ' ' => out.push_str("#\\space"),
                        '\t' => out.push_str("#\\tab"),
                        c => {
                            out.push_str("#\\");
                            out.push(*c);
                        }
                    }
                }
            }
            Cell::Vector(elems) => {
                out.push_str("#(");
                let body = elems
                    .iter()
                    .map(|&e| {
                        if display {
                            self.display_string(e)
                        } else {
                            self.write_string(e)
                        }
                    })
                    .join(" ");
                out.push_str(&body);
                out.push(')');
            }
            Cell::Port { slot, .. } => out.push_str(&format!("#<PORT,{}>", slot)),
            Cell::Primitive(pid) => {
                out.push_str(&format!("#<Primitive procedure {}>", ops::prim(*pid).name))
            }
            Cell::SpecialForm(pid) => {
                out.push_str(&format!("#<Primitive form {}>", ops::prim(*pid).name))
            }
            Cell::UserForm { .. } => out.push_str("#<Form>"),
            Cell::Closure { .. } => out.push_str("#<Closure>"),
            Cell::Continuation { .. } => out.push_str("#<Continuation>"),
            Cell::Bytecode { code, .. } => out.push_str(&format!("#<Code,{}>", code.len())),
            Cell::ExecPoint { pc, .. } => out.push_str(&format!("#<PC,{}>", pc)),
            Cell::Resume(kind) => out.push_str(&format!("#<Resume,{:?}>", kind)),
            Cell::Environment { .. } => out.push_str("#<Environment>"),
            Cell::Free { .. } => out.push_str("#<FREE>"),
            Cell::Pair { .. } => unreachable!("emit_atom called on a pair"),
        }
    }
}
