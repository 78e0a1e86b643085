//! The symbol intern table.
//!
//! A closed hash table of fixed capacity. Symbol cells carry only the table
//! index, so two symbol cells denote the same symbol iff their indices are
//! equal, and the index doubles as the slot in the global environment's
//! binding table. Interned names are never released.

use super::error::{EvalResult, SchemeError};
use super::cell::SymbolId;

/// Capacity of the intern table and of the global binding table.
pub const MAX_SYMBOLS: usize = 1013;

/// Closed hash table mapping name <-> index.
pub struct SymbolTable {
    names: Vec<Option<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { names: vec![None; MAX_SYMBOLS] }
    }

    /// Position-weighted byte sum, modulo capacity.
    fn hash(name: &str) -> usize {
        let mut h: usize = 0;
        for (i, b) in name.bytes().enumerate() {
            h = h.wrapping_add((i + 1).wrapping_mul(b as usize));
        }
        h % MAX_SYMBOLS
    }

    /// Intern `name`, returning its index. Errors when the table is full.
    pub fn intern(&mut self, name: &str) -> EvalResult<SymbolId> {
        let start = Self::hash(name);
        let mut probe = start;
        loop {
            match &self.names[probe] {
                None => {
                    self.names[probe] = Some(name.to_string());
                    return Ok(probe);
                }
                Some(existing) if existing == name => return Ok(probe),
                Some(_) => {
                    probe = (probe + 1) % MAX_SYMBOLS;
                    if probe == start {
                        return Err(SchemeError::SymbolTableFull);
                    }
                }
            }
        }
    }

    /// Whether `name` is already interned, without interning it.
    pub fn contains(&self, name: &str) -> bool {
        let start = Self::hash(name);
        let mut probe = start;
        loop {
            match &self.names[probe] {
                None => return false,
                Some(existing) if existing == name => return true,
                Some(_) => {
                    probe = (probe + 1) % MAX_SYMBOLS;
                    if probe == start {
                        return false;
                    }
                }
            }
        }
    }

    /// The interned name for `id`.
    pub fn name(&self, id: SymbolId) -> &str {
        self.names[id].as_deref().unwrap_or("")
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("CAR").unwrap();
        let b = table.intern("CAR").unwrap();
        assert_eq!(a, b);
        assert_eq!(table.name(a), "CAR");
    }

    #[test]
    fn test_distinct_symbols_get_distinct_slots() {
        let mut table = SymbolTable::new();
        let a = table.intern("FOO").unwrap();
        let b = table.intern("BAR").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_contains_does_not_intern() {
        let mut table = SymbolTable::new();
        assert!(!table.contains("G0"));
        table.intern("G0").unwrap();
        assert!(table.contains("G0"));
    }

    #[test]
    fn test_collisions_probe_linearly() {
        let mut table = SymbolTable::new();
        // These all land somewhere; interning many symbols must stay stable.
        let ids: Vec<_> = (0..100)
            .map(|i| table.intern(&format!("SYM-{}", i)).unwrap())
            .collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(table.name(*id), format!("SYM-{}", i));
        }
    }
}
