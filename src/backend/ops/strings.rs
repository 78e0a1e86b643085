//! Character and string primitives.
//!
//! Strings are byte strings as far as indexing is concerned; `substring`
//! takes inclusive start and end indexes, as the source machine's did.

use crate::backend::cell::{Cell, CellRef};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

fn want_char(it: &Interp, r: CellRef, msg: &str) -> EvalResult<char> {
    match it.cell(r) {
        Cell::Char(c) => Ok(*c),
        _ => Err(SchemeError::Runtime(msg.to_string())),
    }
}

fn want_string(it: &Interp, r: CellRef, msg: &str) -> EvalResult<String> {
    match it.cell(r) {
        Cell::Str(s) => Ok(s.clone()),
        _ => Err(SchemeError::Runtime(msg.to_string())),
    }
}

fn want_int(it: &Interp, r: CellRef, msg: &str) -> EvalResult<i64> {
    match it.cell(r) {
        Cell::Int(i) => Ok(*i),
        _ => Err(SchemeError::Runtime(msg.to_string())),
    }
}

/// (CHAR->INTEGER char)
pub fn op_char_to_int(it: &mut Interp) -> EvalResult<()> {
    let c = it.vals.pop()?;
    let c = want_char(it, c, "CHAR->INTEGER: Arg must be a character.")?;
    let cell = it.int(c as i64);
    it.vals.push(cell)
}

/// (INTEGER->CHAR int) - out-of-range yields the nul character.
pub fn op_int_to_char(it: &mut Interp) -> EvalResult<()> {
    let n = it.vals.pop()?;
    let n = want_int(it, n, "INTEGER->CHAR: Arg must be an integer.")?;
    let c = if (0..=255).contains(&n) { n as u8 as char } else { '\0' };
    let cell = it.char_cell(c);
    it.vals.push(cell)
}

fn char_compare(it: &mut Interp, cmp: fn(char, char) -> bool) -> EvalResult<()> {
    let b = it.vals.pop()?;
    let a = it.vals.pop()?;
    let result = match (it.cell(a), it.cell(b)) {
        (Cell::Char(x), Cell::Char(y)) => cmp(*x, *y),
        _ => false,
    };
    let result = it.boolean(result);
    it.vals.push(result)
}

/// (CHAR=? a b)
pub fn op_char_eq(it: &mut Interp) -> EvalResult<()> {
    char_compare(it, |a, b| a == b)
}

/// (CHAR<? a b)
pub fn op_char_lt(it: &mut Interp) -> EvalResult<()> {
    char_compare(it, |a, b| a < b)
}

/// (CHAR>? a b)
pub fn op_char_gt(it: &mut Interp) -> EvalResult<()> {
    char_compare(it, |a, b| a > b)
}

/// (CHAR<=? a b)
pub fn op_char_le(it: &mut Interp) -> EvalResult<()> {
    char_compare(it, |a, b| a <= b)
}

/// (CHAR>=? a b)
pub fn op_char_ge(it: &mut Interp) -> EvalResult<()> {
    char_compare(it, |a, b| a >= b)
}

/// (STRING-LENGTH string)
pub fn op_str_len(it: &mut Interp) -> EvalResult<()> {
    let s = it.vals.pop()?;
    let s = want_string(it, s, "STRING-LENGTH: Arg must be a string.")?;
    let cell = it.int(s.len() as i64);
    it.vals.push(cell)
}

/// (STRING-REF string k)
pub fn op_str_ref(it: &mut Interp) -> EvalResult<()> {
    let k = it.vals.pop()?;
    let s = it.vals.pop()?;
    let s = want_string(it, s, "STRING-REF: First arg must be a string.")?;
    let k = want_int(it, k, "STRING-REF: Second arg must be an integer.")?;
    if k < 0 || k as usize >= s.len() {
        return Err(SchemeError::Runtime(format!(
            "STRING-REF: REF is greater than string length: {}",
            k
        )));
    }
    let c = s.as_bytes()[k as usize] as char;
    let cell = it.char_cell(c);
    it.vals.push(cell)
}

/// (SUBSTRING string start end) - both indexes inclusive.
pub fn op_substring(it: &mut Interp) -> EvalResult<()> {
    let end = it.vals.pop()?;
    let start = it.vals.pop()?;
    let s = it.vals.pop()?;
    let s = want_string(it, s, "SUBSTRING: First arg must be a string.")?;
    let start = want_int(it, start, "SUBSTRING: Second arg must be an integer.")?;
    let end = want_int(it, end, "SUBSTRING: Third arg must be an integer.")?;
    let last = s.len() as i64 - 1;
    if start < 0 || start > last {
        return Err(SchemeError::Runtime("SUBSTRING: START > string length.".to_string()));
    }
    if end < 0 || end > last {
        return Err(SchemeError::Runtime("SUBSTRING: STOP > string length.".to_string()));
    }
    let sub: String = s
        .as_bytes()
        .iter()
        .skip(start as usize)
        .take((end - start + 1).max(0) as usize)
        .map(|&b| b as char)
        .collect();
    let cell = it.string(sub);
    it.vals.push(cell)
}

/// (STRING-APPEND str1 str2)
pub fn op_str_append(it: &mut Interp) -> EvalResult<()> {
    let b = it.vals.pop()?;
    let a = it.vals.pop()?;
    let a = want_string(it, a, "STRING-APPEND: Args must be strings.")?;
    let b = want_string(it, b, "STRING-APPEND: Args must be strings.")?;
    let cell = it.string(a + &b);
    it.vals.push(cell)
}

/// (STRING->LIST string)
pub fn op_str_to_list(it: &mut Interp) -> EvalResult<()> {
    let s = it.vals.pop()?;
    let s = want_string(it, s, "STRING->LIST: Arg must be a string.")?;
    let rm = it.reg_mark();
    let acc = it.reg_push(it.nil);
    for &b in s.as_bytes().iter().rev() {
        let c = it.char_cell(b as char);
        let lst = it.cons(c, it.reg(acc));
        it.set_reg(acc, lst);
    }
    let lst = it.reg(acc);
    it.vals.push(lst)?;
    it.reg_release(rm);
    Ok(())
}

/// (LIST->STRING chars)
pub fn op_list_to_str(it: &mut Interp) -> EvalResult<()> {
    let mut l = it.vals.pop()?;
    let mut s = String::new();
    while it.is_pair(l) {
        let c = it.car(l);
        s.push(want_char(it, c, "LIST->STRING: Atom must be a character.")?);
        l = it.cdr(l);
    }
    let cell = it.string(s);
    it.vals.push(cell)
}

/// (SYMBOL->STRING symbol)
pub fn op_sym_to_str(it: &mut Interp) -> EvalResult<()> {
    let sym = it.vals.pop()?;
    if !it.is_symbol(sym) {
        return Err(SchemeError::Runtime("SYMBOL->STRING: Arg must be a symbol.".to_string()));
    }
    let name = it.sym_name(sym).to_string();
    let cell = it.string(name);
    it.vals.push(cell)
}

/// (STRING->SYMBOL string) - the name is interned exactly as given.
pub fn op_str_to_sym(it: &mut Interp) -> EvalResult<()> {
    let s = it.vals.pop()?;
    let s = want_string(it, s, "STRING->SYMBOL: Arg must be a string.")?;
    let sym = it.symbol(&s)?;
    it.vals.push(sym)
}

fn string_compare(it: &mut Interp, cmp: fn(&str, &str) -> bool) -> EvalResult<()> {
    let b = it.vals.pop()?;
    let a = it.vals.pop()?;
    let result = match (it.cell(a), it.cell(b)) {
        (Cell::Str(x), Cell::Str(y)) => cmp(x, y),
        _ => false,
    };
    let result = it.boolean(result);
    it.vals.push(result)
}

/// (STRING=? a b)
pub fn op_str_eq(it: &mut Interp) -> EvalResult<()> {
    string_compare(it, |a, b| a == b)
}

/// (STRING<? a b)
pub fn op_str_lt(it: &mut Interp) -> EvalResult<()> {
    string_compare(it, |a, b| a < b)
}

/// (STRING>? a b)
pub fn op_str_gt(it: &mut Interp) -> EvalResult<()> {
    string_compare(it, |a, b| a > b)
}

/// (STRING<=? a b)
pub fn op_str_le(it: &mut Interp) -> EvalResult<()> {
    string_compare(it, |a, b| a <= b)
}

/// (STRING>=? a b)
pub fn op_str_ge(it: &mut Interp) -> EvalResult<()> {
    string_compare(it, |a, b| a >= b)
}
