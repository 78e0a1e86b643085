//! I/O primitives: reading, writing, ports, and `load`.
//!
//! Optional-port arguments follow the mark protocol: these primitives are
//! registered variadic, so the value stack holds a mark below the argument
//! group; a handler that finds the mark where the port would be uses the
//! current default port instead.
//!
//! `load` cannot simply recurse into the evaluator, so it threads itself
//! through the resume protocol: the resume handler discards the previous
//! expression's value, reads the next expression from the port, and either
//! re-installs itself or closes the port at end of file.

use std::fs::File;
use std::io::BufReader;

use crate::backend::cell::{Cell, CellRef, PortDir, ResumeKind};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;
use crate::backend::ports::{PortState, Stream};

fn want_input_port(it: &Interp, r: CellRef, who: &str) -> EvalResult<()> {
    match it.cell(r) {
        Cell::Port { dir: PortDir::Input, .. } => Ok(()),
        Cell::Port { .. } => {
            Err(SchemeError::Runtime(format!("{}: Port must be an input port.", who)))
        }
        _ => Err(SchemeError::Runtime(format!("{}: Arg must be a port.", who))),
    }
}

fn want_output_port(it: &Interp, r: CellRef, who: &str) -> EvalResult<()> {
    match it.cell(r) {
        Cell::Port { dir: PortDir::Output, .. } => Ok(()),
        Cell::Port { .. } => {
            Err(SchemeError::Runtime(format!("{}: Port must be an output port.", who)))
        }
        _ => Err(SchemeError::Runtime(format!("{}: Arg must be a port.", who))),
    }
}

/// Pop an optional trailing port argument: `(op)` leaves the mark on top,
/// `(op port)` leaves the port above the mark.
fn optional_port(it: &mut Interp) -> EvalResult<Option<CellRef>> {
    let v = it.vals.pop()?;
    if v == it.mark {
        Ok(None)
    } else {
        it.vals.pop()?; // mark
        Ok(Some(v))
    }
}

/// Pop one required argument plus an optional trailing port.
fn arg_and_optional_port(it: &mut Interp) -> EvalResult<(CellRef, Option<CellRef>)> {
    let first = it.vals.pop()?;
    let second = it.vals.pop()?;
    if second == it.mark {
        Ok((first, None))
    } else {
        it.vals.pop()?; // mark
        Ok((second, Some(first)))
    }
}

/// (READ [port])
pub fn op_read(it: &mut Interp) -> EvalResult<()> {
    let port = match optional_port(it)? {
        Some(p) => {
            want_input_port(it, p, "READ")?;
            p
        }
        None => it.curr_in,
    };
    let obj = it.read(port)?;
    it.vals.push(obj)
}

/// (WRITE obj [port])
pub fn op_write(it: &mut Interp) -> EvalResult<()> {
    let (obj, port) = arg_and_optional_port(it)?;
    let port = match port {
        Some(p) => {
            want_output_port(it, p, "WRITE")?;
            p
        }
        None => it.curr_out,
    };
    let text = it.write_string(obj);
    it.port_write(port, &text)?;
    it.vals.push(obj)
}

/// (DISPLAY obj [port])
pub fn op_display(it: &mut Interp) -> EvalResult<()> {
    let (obj, port) = arg_and_optional_port(it)?;
    let port = match port {
        Some(p) => {
            want_output_port(it, p, "DISPLAY")?;
            p
        }
        None => it.curr_out,
    };
    let text = it.display_string(obj);
    it.port_write(port, &text)?;
    it.vals.push(obj)
}

/// (NEWLINE [port])
pub fn op_newline(it: &mut Interp) -> EvalResult<()> {
    let port = match optional_port(it)? {
        Some(p) => {
            want_output_port(it, p, "NEWLINE")?;
            p
        }
        None => it.curr_out,
    };
    it.port_write(port, "\n")?;
    it.vals.push(it.nil)
}

/// (READ-CHAR [port])
pub fn op_read_char(it: &mut Interp) -> EvalResult<()> {
    let port = match optional_port(it)? {
        Some(p) => {
            want_input_port(it, p, "READ-CHAR")?;
            p
        }
        None => it.curr_in,
    };
    let (slot, _) = it
        .port_info(port)
        .ok_or_else(|| SchemeError::Runtime("READ-CHAR: Arg must be a port.".to_string()))?;
    let cell = match it.port_state(slot)?.getc()? {
        Some(b) => it.char_cell(b as char),
        None => it.eof,
    };
    it.vals.push(cell)
}

/// (WRITE-CHAR char [port])
pub fn op_write_char(it: &mut Interp) -> EvalResult<()> {
    let (ch, port) = arg_and_optional_port(it)?;
    let c = match it.cell(ch) {
        Cell::Char(c) => *c,
        _ => {
            return Err(SchemeError::Runtime(
                "WRITE-CHAR: First arg must be a character.".to_string(),
            ))
        }
    };
    let port = match port {
        Some(p) => {
            want_output_port(it, p, "WRITE-CHAR")?;
            p
        }
        None => it.curr_out,
    };
    it.port_write(port, &c.to_string())?;
    it.vals.push(ch)
}

/// (OPEN-INPUT-FILE name)
pub fn op_open_in_file(it: &mut Interp) -> EvalResult<()> {
    let name = it.vals.pop()?;
    let path = match it.cell(name) {
        Cell::Str(s) => s.clone(),
        _ => {
            return Err(SchemeError::Runtime(
                "OPEN-INPUT-FILE: First arg must be a string.".to_string(),
            ))
        }
    };
    let file = File::open(&path)
        .map_err(|_| SchemeError::Runtime(format!("OPEN-INPUT-FILE: Can't open: \"{}\"", path)))?;
    let port =
        it.add_port(PortState::new(Stream::FileIn(BufReader::new(file))), PortDir::Input);
    it.vals.push(port)
}

/// (OPEN-OUTPUT-FILE name)
pub fn op_open_out_file(it: &mut Interp) -> EvalResult<()> {
    let name = it.vals.pop()?;
    let path = match it.cell(name) {
        Cell::Str(s) => s.clone(),
        _ => {
            return Err(SchemeError::Runtime(
                "OPEN-OUTPUT-FILE: First arg must be a string.".to_string(),
            ))
        }
    };
    let file = File::create(&path).map_err(|_| {
        SchemeError::Runtime(format!("OPEN-OUTPUT-FILE: Can't open: \"{}\"", path))
    })?;
    let port = it.add_port(PortState::new(Stream::FileOut(file)), PortDir::Output);
    it.vals.push(port)
}

/// (CLOSE-FILE port)
pub fn op_close_file(it: &mut Interp) -> EvalResult<()> {
    let port = it.vals.pop()?;
    if !matches!(it.cell(port), Cell::Port { .. }) {
        return Err(SchemeError::Runtime("CLOSE-FILE: Arg must be a port.".to_string()));
    }
    it.close_port(port);
    it.vals.push(it.nil)
}

/// (CURRENT-INPUT-PORT)
pub fn op_curr_in(it: &mut Interp) -> EvalResult<()> {
    let p = it.curr_in;
    it.vals.push(p)
}

/// (CURRENT-OUTPUT-PORT)
pub fn op_curr_out(it: &mut Interp) -> EvalResult<()> {
    let p = it.curr_out;
    it.vals.push(p)
}

/// (LOAD filename) - the file name is the eventual value of the form.
pub fn op_load(it: &mut Interp) -> EvalResult<()> {
    let name = it.vals.pop()?;
    // The name goes back first: the final resume round leaves it as the
    // result once the whole file has been evaluated.
    it.vals.push(name)?;
    let path = match it.cell(name) {
        Cell::Str(s) => s.clone(),
        _ => return Err(SchemeError::Runtime("LOAD: Arg must be a string.".to_string())),
    };
    if !it.load_file(&path)? {
        return Err(SchemeError::Runtime(format!("LOAD: File not found: \"{}\"", path)));
    }
    Ok(())
}

impl Interp {
    /// Begin loading a file: open it and install the first load resume.
    /// Returns false when the file cannot be opened. The caller drives the
    /// evaluator afterwards.
    pub fn load_file(&mut self, path: &str) -> EvalResult<bool> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Ok(false),
        };
        let port =
            self.add_port(PortState::new(Stream::FileIn(BufReader::new(file))), PortDir::Input);
        self.vals.push(port)?;
        // A dummy value for the first resume round to throw away.
        self.vals.push(self.t)?;
        let resume = self.alloc(Cell::Resume(ResumeKind::Load));
        res_load(self, resume)?;
        Ok(true)
    }
}

/// Resume loading: drop the last value, read the next expression, and
/// either queue it under a fresh resume or close up at end of file.
pub fn res_load(it: &mut Interp, resume: CellRef) -> EvalResult<()> {
    let rm = it.reg_mark();
    it.reg_push(resume);

    it.vals.pop()?; // previous expression's value
    let port = it.vals.pop()?;
    it.reg_push(port);

    let exp = it.read(port)?;
    if exp == it.eof {
        it.close_port(port);
        it.reg_release(rm);
        return Ok(());
    }
    it.vals.push(port)?;
    it.exprs.push(resume)?;
    it.exprs.push(exp)?;
    it.reg_release(rm);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;
    use std::io::Write;

    #[test]
    fn test_load_evaluates_file_and_returns_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boot.scm");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "(define loaded-a 1)").unwrap();
        writeln!(f, "(define (loaded-f x) (+ x loaded-a))").unwrap();
        drop(f);

        let mut it = Interp::new().unwrap();
        let src = format!("(load \"{}\") (loaded-f 41)", path.display());
        let out = it.eval_str(&src).unwrap();
        assert_eq!(out[0], format!("\"{}\"", path.display()));
        assert_eq!(out[1], "42");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let mut it = Interp::new().unwrap();
        assert!(it.eval_str("(load \"no-such-file.scm\")").is_err());
    }

    #[test]
    fn test_nested_load() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner.scm");
        std::fs::write(&inner, "(define inner-x 10)").unwrap();
        let outer = dir.path().join("outer.scm");
        std::fs::write(
            &outer,
            format!("(load \"{}\")\n(define outer-x (+ inner-x 1))", inner.display()),
        )
        .unwrap();

        let mut it = Interp::new().unwrap();
        let out =
            it.eval_str(&format!("(load \"{}\") outer-x", outer.display())).unwrap();
        assert_eq!(out[1], "11");
    }

    #[test]
    fn test_file_port_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.scm");
        let mut it = Interp::new().unwrap();
        let out = it
            .eval_str(&format!(
                "(define p (open-output-file \"{0}\"))
                 (write '(1 two \"three\") p)
                 (close-file p)
                 (define q (open-input-file \"{0}\"))
                 (define d (read q))
                 (close-file q)
                 d",
                path.display()
            ))
            .unwrap();
        assert_eq!(out.last().unwrap(), "(1 TWO \"three\")");
    }

    #[test]
    fn test_read_char_hits_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.txt");
        std::fs::write(&path, "a").unwrap();
        let mut it = Interp::new().unwrap();
        let out = it
            .eval_str(&format!(
                "(define p (open-input-file \"{}\"))
                 (define c1 (read-char p))
                 (define c2 (read-char p))
                 (list c1 (eof-object? c2))",
                path.display()
            ))
            .unwrap();
        assert_eq!(out.last().unwrap(), "(#\\a #T)");
    }
}
