//! Environment persistence: `dump-environment` / `restore-environment`.
//!
//! The format is a sequence of records, one per bound global symbol:
//! a length-prefixed symbol name followed by the value, serialised
//! recursively by tag. Primitives and primitive forms are not dumped (a
//! fresh interpreter re-binds them at startup); ports, continuations, and
//! other machine-state values are not serialisable and raise a runtime
//! error. Integers and floats are written as 8-byte little-endian.

use std::io::{ErrorKind, Read, Write};

use super::cell::{Cell, CellRef};
use super::error::{EvalResult, SchemeError};
use super::interp::Interp;
use super::symbols::MAX_SYMBOLS;

const TAG_NIL: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_FALSE: u8 = 3;
const TAG_EOF: u8 = 4;
const TAG_PAIR: u8 = 5;
const TAG_INT: u8 = 6;
const TAG_FLOAT: u8 = 7;
const TAG_SYMBOL: u8 = 8;
const TAG_CHAR: u8 = 9;
const TAG_STRING: u8 = 10;
const TAG_BYTECODE: u8 = 11;
const TAG_CLOSURE: u8 = 12;
const TAG_VECTOR: u8 = 13;

fn io_err(e: std::io::Error) -> SchemeError {
    SchemeError::Io(e.to_string())
}

fn write_bytes(w: &mut impl Write, bytes: &[u8]) -> EvalResult<()> {
    w.write_all(bytes).map_err(io_err)
}

fn write_len(w: &mut impl Write, len: usize) -> EvalResult<()> {
    write_bytes(w, &(len as u32).to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> EvalResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_exactly(r: &mut impl Read, len: usize) -> EvalResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf)
}

impl Interp {
    fn global_by_id(&self, id: usize) -> Option<CellRef> {
        match self.cell(self.env) {
            Cell::Environment { global, .. } => global[id],
            _ => None,
        }
    }

    /// Write every dumpable global binding to `w`.
    pub fn dump_env(&self, w: &mut impl Write) -> EvalResult<()> {
        for id in 0..MAX_SYMBOLS {
            let Some(value) = self.global_by_id(id) else {
                continue;
            };
            if matches!(self.cell(value), Cell::Primitive(_) | Cell::SpecialForm(_)) {
                continue;
            }
            let name = self.symbols.name(id);
            write_len(w, name.len())?;
            write_bytes(w, name.as_bytes())?;
            self.dump_cell(w, value)?;
        }
        Ok(())
    }

    fn dump_cell(&self, w: &mut impl Write, c: CellRef) -> EvalResult<()> {
        match self.cell(c) {
            Cell::Nil => write_bytes(w, &[TAG_NIL]),
            Cell::True => write_bytes(w, &[TAG_TRUE]),
            Cell::False => write_bytes(w, &[TAG_FALSE]),
            Cell::Eof => write_bytes(w, &[TAG_EOF]),
            Cell::Int(i) => {
                write_bytes(w, &[TAG_INT])?;
                write_bytes(w, &i.to_le_bytes())
            }
            Cell::Float(x) => {
                write_bytes(w, &[TAG_FLOAT])?;
                write_bytes(w, &x.to_le_bytes())
            }
            Cell::Symbol(id) => {
                write_bytes(w, &[TAG_SYMBOL])?;
                let name = self.symbols.name(*id);
                write_len(w, name.len())?;
                write_bytes(w, name.as_bytes())
            }
            Cell::Char(ch) => write_bytes(w, &[TAG_CHAR, *ch as u8]),
            Cell::Str(s) => {
                write_bytes(w, &[TAG_STRING])?;
                write_len(w, s.len())?;
                write_bytes(w, s.as_bytes())
            }
            Cell::Pair { car, cdr } => {
                write_bytes(w, &[TAG_PAIR])?;
                self.dump_cell(w, *car)?;
                self.dump_cell(w, *cdr)
            }
            Cell::Vector(elems) => {
                write_bytes(w, &[TAG_VECTOR])?;
                write_len(w, elems.len())?;
                for &e in elems {
                    self.dump_cell(w, e)?;
                }
                Ok(())
            }
            Cell::Bytecode { code, consts } => {
                write_bytes(w, &[TAG_BYTECODE])?;
                write_len(w, code.len())?;
                write_len(w, consts.len())?;
                write_bytes(w, code)?;
                for &k in consts {
                    self.dump_cell(w, k)?;
                }
                Ok(())
            }
            Cell::Closure { params, body, env } => {
                write_bytes(w, &[TAG_CLOSURE])?;
                self.dump_cell(w, *env)?;
                self.dump_cell(w, *params)?;
                self.dump_cell(w, *body)
            }
            other => Err(SchemeError::Runtime(format!(
                "DUMP-ENVIRONMENT: Unsupported data-type: {}",
                other.kind_name()
            ))),
        }
    }

    /// Read records from `r`, binding each symbol in the current global
    /// environment (replacing any existing binding).
    pub fn restore_env(&mut self, r: &mut impl Read) -> EvalResult<()> {
        let rm = self.reg_mark();
        loop {
            // A clean end of file between records ends the dump.
            let mut lenbuf = [0u8; 4];
            match r.read_exact(&mut lenbuf) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(io_err(e)),
            }
            let len = u32::from_le_bytes(lenbuf) as usize;
            let name_bytes = read_exactly(r, len)?;
            let name = String::from_utf8_lossy(&name_bytes).into_owned();

            let sym = self.symbol(&name)?;
            let sym_slot = self.reg_push(sym);
            let value = self.restore_cell(r)?;
            self.def_global(self.reg(sym_slot), value)?;
            self.reg_release(rm);
        }
        self.reg_release(rm);
        Ok(())
    }

    fn restore_cell(&mut self, r: &mut impl Read) -> EvalResult<CellRef> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag).map_err(io_err)?;
        match tag[0] {
            TAG_NIL => Ok(self.nil),
            TAG_TRUE => Ok(self.t),
            TAG_FALSE => Ok(self.f),
            TAG_EOF => Ok(self.eof),
            TAG_INT => {
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf).map_err(io_err)?;
                Ok(self.int(i64::from_le_bytes(buf)))
            }
            TAG_FLOAT => {
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf).map_err(io_err)?;
                Ok(self.float(f64::from_le_bytes(buf)))
            }
            TAG_SYMBOL => {
                let len = read_u32(r)? as usize;
                let bytes = read_exactly(r, len)?;
                let name = String::from_utf8_lossy(&bytes).into_owned();
                self.symbol(&name)
            }
            TAG_CHAR => {
                let bytes = read_exactly(r, 1)?;
                Ok(self.char_cell(bytes[0] as char))
            }
            TAG_STRING => {
                let len = read_u32(r)? as usize;
                let bytes = read_exactly(r, len)?;
                Ok(self.string(String::from_utf8_lossy(&bytes).into_owned()))
            }
            TAG_PAIR => {
                let rm = self.reg_mark();
                let car = self.restore_cell(r)?;
                self.reg_push(car);
                let cdr = self.restore_cell(r)?;
                let pair = self.cons(car, cdr);
                self.reg_release(rm);
                Ok(pair)
            }
            TAG_VECTOR => {
                let len = read_u32(r)? as usize;
                let rm = self.reg_mark();
                let v_slot = self.reg_push(self.nil);
                let v = self.alloc(Cell::Vector(vec![self.nil; len]));
                self.set_reg(v_slot, v);
                for i in 0..len {
                    let elem = self.restore_cell(r)?;
                    let dst = self.reg(v_slot);
                    match self.heap.get_mut(dst) {
                        Cell::Vector(elems) => elems[i] = elem,
                        _ => unreachable!("vector changed kind during restore"),
                    }
                }
                let v = self.reg(v_slot);
                self.reg_release(rm);
                Ok(v)
            }
            TAG_BYTECODE => {
                let code_len = read_u32(r)? as usize;
                let const_len = read_u32(r)? as usize;
                let code = read_exactly(r, code_len)?;
                let rm = self.reg_mark();
                let bc_slot = self.reg_push(self.nil);
                let bc =
                    self.alloc(Cell::Bytecode { code, consts: vec![self.nil; const_len] });
                self.set_reg(bc_slot, bc);
                for i in 0..const_len {
                    let k = self.restore_cell(r)?;
                    let dst = self.reg(bc_slot);
                    match self.heap.get_mut(dst) {
                        Cell::Bytecode { consts, .. } => consts[i] = k,
                        _ => unreachable!("bytecode changed kind during restore"),
                    }
                }
                let bc = self.reg(bc_slot);
                self.reg_release(rm);
                Ok(bc)
            }
            TAG_CLOSURE => {
                let rm = self.reg_mark();
                let env = self.restore_cell(r)?;
                self.reg_push(env);
                let params = self.restore_cell(r)?;
                self.reg_push(params);
                let body = self.restore_cell(r)?;
                let close = self.closure(params, body, env);
                self.reg_release(rm);
                Ok(close)
            }
            other => {
                Err(SchemeError::Runtime(format!("RESTORE-ENVIRONMENT: Bad tag: {}", other)))
            }
        }
    }
}

/// (DUMP-ENVIRONMENT filename)
pub fn op_dump_env(it: &mut Interp) -> EvalResult<()> {
    let name = it.vals.pop()?;
    let path = match it.cell(name) {
        Cell::Str(s) => s.clone(),
        _ => {
            return Err(SchemeError::Runtime(
                "DUMP-ENVIRONMENT: Arg must be a string.".to_string(),
            ))
        }
    };
    let file = std::fs::File::create(&path).map_err(|_| {
        SchemeError::Runtime(format!("DUMP-ENVIRONMENT: Can't open: \"{}\"", path))
    })?;
    let mut writer = std::io::BufWriter::new(file);
    it.dump_env(&mut writer)?;
    writer.flush().map_err(io_err)?;
    it.vals.push(name)
}

/// (RESTORE-ENVIRONMENT filename)
pub fn op_restore_env(it: &mut Interp) -> EvalResult<()> {
    let name = it.vals.pop()?;
    let path = match it.cell(name) {
        Cell::Str(s) => s.clone(),
        _ => {
            return Err(SchemeError::Runtime(
                "RESTORE-ENVIRONMENT: Arg must be a string.".to_string(),
            ))
        }
    };
    let rm = it.reg_mark();
    let name_slot = it.reg_push(name);
    let file = std::fs::File::open(&path).map_err(|_| {
        SchemeError::Runtime(format!("RESTORE-ENVIRONMENT: Filename not found: \"{}\"", path))
    })?;
    let mut reader = std::io::BufReader::new(file);
    it.restore_env(&mut reader)?;
    let name = it.reg(name_slot);
    it.vals.push(name)?;
    it.reg_release(rm);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;

    #[test]
    fn test_dump_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.env");
        let path_str = path.display().to_string();

        let mut it = Interp::new().unwrap();
        it.eval_str(
            "(define answer 42)
             (define pi-ish 3.5)
             (define name \"scheme\")
             (define stuff '(1 (2 . 3) #(4 5) #\\x #t))
             (define (inc n) (+ n 1))",
        )
        .unwrap();
        it.eval_str(&format!("(dump-environment \"{}\")", path_str)).unwrap();

        let mut fresh = Interp::new().unwrap();
        fresh.eval_str(&format!("(restore-environment \"{}\")", path_str)).unwrap();
        let out = fresh
            .eval_str("answer pi-ish name stuff (inc 41)")
            .unwrap();
        assert_eq!(out, vec!["42", "3.5", "\"scheme\"", "(1 (2 . 3) #(4 5) #\\x #T)", "42"]);
    }

    #[test]
    fn test_restore_replaces_existing_binding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.env");
        let path_str = path.display().to_string();

        let mut it = Interp::new().unwrap();
        it.eval_str("(define x 1)").unwrap();
        it.eval_str(&format!("(dump-environment \"{}\")", path_str)).unwrap();

        let mut fresh = Interp::new().unwrap();
        fresh.eval_str("(define x 99)").unwrap();
        fresh.eval_str(&format!("(restore-environment \"{}\")", path_str)).unwrap();
        assert_eq!(fresh.eval_str("x").unwrap(), vec!["1"]);
    }

    #[test]
    fn test_primitives_are_not_dumped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.env");
        let path_str = path.display().to_string();

        let mut it = Interp::new().unwrap();
        it.eval_str(&format!("(dump-environment \"{}\")", path_str)).unwrap();
        // Only the expansion table's () binding is written.
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.len() < 64);
    }

    #[test]
    fn test_continuation_refuses_to_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.env");
        let mut it = Interp::new().unwrap();
        it.eval_str("(define k (call/cc (lambda (c) c)))").unwrap();
        // k may hold the continuation; dumping it must error, not corrupt.
        let res = it.eval_str(&format!("(dump-environment \"{}\")", path.display()));
        assert!(res.is_err());
    }
}
