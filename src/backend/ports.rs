//! Host streams behind port cells.
//!
//! A port cell carries a slot index into the interpreter's port table plus a
//! direction tag; the table owns the actual stream. Decoupling the stream
//! from the heap keeps I/O out of the collector's way: sweeping a dead port
//! cell releases its slot, which closes the underlying file.

use std::fs::File;
use std::io::{BufReader, Read, Write};

use super::error::{EvalResult, SchemeError};

pub enum Stream {
    Stdin,
    Stdout,
    FileIn(BufReader<File>),
    FileOut(File),
    /// In-memory input, used by the REPL and by tests
    StrIn { bytes: Vec<u8>, pos: usize },
}

pub struct PortState {
    stream: Stream,
    pushback: Option<u8>,
}

impl PortState {
    pub fn new(stream: Stream) -> Self {
        Self { stream, pushback: None }
    }

    pub fn from_string(text: &str) -> Self {
        Self::new(Stream::StrIn { bytes: text.as_bytes().to_vec(), pos: 0 })
    }

    /// Next byte, or `None` at end of input.
    pub fn getc(&mut self) -> EvalResult<Option<u8>> {
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        match &mut self.stream {
            Stream::Stdin => {
                let mut buf = [0u8; 1];
                match std::io::stdin().read(&mut buf) {
                    Ok(0) => Ok(None),
                    Ok(_) => Ok(Some(buf[0])),
                    Err(e) => Err(SchemeError::Io(e.to_string())),
                }
            }
            Stream::FileIn(reader) => {
                let mut buf = [0u8; 1];
                match reader.read(&mut buf) {
                    Ok(0) => Ok(None),
                    Ok(_) => Ok(Some(buf[0])),
                    Err(e) => Err(SchemeError::Io(e.to_string())),
                }
            }
            Stream::StrIn { bytes, pos } => {
                if *pos < bytes.len() {
                    let b = bytes[*pos];
                    *pos += 1;
                    Ok(Some(b))
                } else {
                    Ok(None)
                }
            }
            Stream::Stdout | Stream::FileOut(_) => {
                Err(SchemeError::Runtime("Can't read from an output port".to_string()))
            }
        }
    }

    /// Push one byte back; the next `getc` returns it.
    pub fn ungetc(&mut self, b: u8) {
        self.pushback = Some(b);
    }

    pub fn write_str(&mut self, text: &str) -> EvalResult<()> {
        match &mut self.stream {
            Stream::Stdout => {
                let mut out = std::io::stdout();
                out.write_all(text.as_bytes())
                    .and_then(|_| out.flush())
                    .map_err(|e| SchemeError::Io(e.to_string()))
            }
            Stream::FileOut(file) => {
                file.write_all(text.as_bytes()).map_err(|e| SchemeError::Io(e.to_string()))
            }
            _ => Err(SchemeError::Runtime("Can't write to an input port".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_port_reads_bytes() {
        let mut p = PortState::from_string("ab");
        assert_eq!(p.getc().unwrap(), Some(b'a'));
        assert_eq!(p.getc().unwrap(), Some(b'b'));
        assert_eq!(p.getc().unwrap(), None);
    }

    #[test]
    fn test_ungetc_round_trips() {
        let mut p = PortState::from_string("x");
        let b = p.getc().unwrap().unwrap();
        p.ungetc(b);
        assert_eq!(p.getc().unwrap(), Some(b'x'));
        assert_eq!(p.getc().unwrap(), None);
    }
}
