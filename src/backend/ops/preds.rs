//! Type predicates, equality, and `not`.

use crate::backend::cell::{Cell, CellRef, PortDir};
use crate::backend::error::EvalResult;
use crate::backend::interp::Interp;

fn pred(it: &mut Interp, test: fn(&Interp, CellRef) -> bool) -> EvalResult<()> {
    let v = it.vals.pop()?;
    let result = it.boolean(test(it, v));
    it.vals.push(result)
}

/// (NULL? obj)
pub fn op_is_null(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_nil(v))
}

/// (ATOM? obj) - everything that is not a pair.
pub fn op_is_atom(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_atom(v))
}

/// (PAIR? obj)
pub fn op_is_pair(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_pair(v))
}

/// (SYMBOL? obj)
pub fn op_is_symbol(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_symbol(v))
}

/// (NUMBER? obj)
pub fn op_is_number(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_number(v))
}

/// (INTEGER? obj)
pub fn op_is_integer(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| matches!(it.cell(v), Cell::Int(_)))
}

/// (FLOAT? obj)
pub fn op_is_float(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| matches!(it.cell(v), Cell::Float(_)))
}

/// (ZERO? obj) - false for non-numbers.
pub fn op_is_zero(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| match it.cell(v) {
        Cell::Int(i) => *i == 0,
        Cell::Float(x) => *x == 0.0,
        _ => false,
    })
}

/// (BOOLEAN? obj)
pub fn op_is_boolean(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| v == it.t || v == it.f)
}

/// (PROCEDURE? obj) - closures, primitives, and continuations.
pub fn op_is_procedure(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| {
        matches!(it.cell(v), Cell::Closure { .. } | Cell::Primitive(_) | Cell::Continuation { .. })
    })
}

/// (CHAR? obj)
pub fn op_is_char(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| matches!(it.cell(v), Cell::Char(_)))
}

/// (STRING? obj)
pub fn op_is_string(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_string(v))
}

/// (VECTOR? obj)
pub fn op_is_vector(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| matches!(it.cell(v), Cell::Vector(_)))
}

/// (EOF-OBJECT? obj)
pub fn op_is_eof_object(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| v == it.eof)
}

/// (INPUT-PORT? obj)
pub fn op_is_input_port(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| matches!(it.cell(v), Cell::Port { dir: PortDir::Input, .. }))
}

/// (OUTPUT-PORT? obj)
pub fn op_is_output_port(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| matches!(it.cell(v), Cell::Port { dir: PortDir::Output, .. }))
}

fn equality(it: &mut Interp, test: fn(&Interp, CellRef, CellRef) -> bool) -> EvalResult<()> {
    let b = it.vals.pop()?;
    let a = it.vals.pop()?;
    let result = it.boolean(test(it, a, b));
    it.vals.push(result)
}

/// (EQ? a b) - same cell, or the same symbol.
pub fn op_eq(it: &mut Interp) -> EvalResult<()> {
    equality(it, Interp::eq_cells)
}

/// (EQV? a b)
pub fn op_eqv(it: &mut Interp) -> EvalResult<()> {
    equality(it, Interp::eqv_cells)
}

/// (EQUAL? a b)
pub fn op_equal(it: &mut Interp) -> EvalResult<()> {
    equality(it, Interp::equal_cells)
}

/// (NOT obj)
pub fn op_not(it: &mut Interp) -> EvalResult<()> {
    pred(it, |it, v| it.is_false(v))
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;

    fn eval_one(src: &str) -> String {
        let mut it = Interp::new().unwrap();
        it.eval_str(src).unwrap().pop().unwrap()
    }

    #[test]
    fn test_type_predicates() {
        assert_eq!(eval_one("(null? '())"), "#T");
        assert_eq!(eval_one("(null? '(1))"), "#F");
        assert_eq!(eval_one("(atom? 'a)"), "#T");
        assert_eq!(eval_one("(atom? '(a))"), "#F");
        assert_eq!(eval_one("(atom? '())"), "#T");
        assert_eq!(eval_one("(pair? '(a))"), "#T");
        assert_eq!(eval_one("(symbol? 'a)"), "#T");
        assert_eq!(eval_one("(symbol? 1)"), "#F");
        assert_eq!(eval_one("(number? 1)"), "#T");
        assert_eq!(eval_one("(number? 1.5)"), "#T");
        assert_eq!(eval_one("(integer? 1)"), "#T");
        assert_eq!(eval_one("(integer? 1.5)"), "#F");
        assert_eq!(eval_one("(float? 1.5)"), "#T");
        assert_eq!(eval_one("(zero? 0)"), "#T");
        assert_eq!(eval_one("(zero? 0.0)"), "#T");
        assert_eq!(eval_one("(zero? 'a)"), "#F");
        assert_eq!(eval_one("(boolean? #t)"), "#T");
        assert_eq!(eval_one("(boolean? '())"), "#F");
        assert_eq!(eval_one("(char? #\\a)"), "#T");
        assert_eq!(eval_one("(string? \"s\")"), "#T");
        assert_eq!(eval_one("(vector? #(1))"), "#T");
        assert_eq!(eval_one("(procedure? car)"), "#T");
        assert_eq!(eval_one("(procedure? (lambda (x) x))"), "#T");
        assert_eq!(eval_one("(procedure? 'car)"), "#F");
    }

    #[test]
    fn test_port_predicates() {
        assert_eq!(eval_one("(input-port? (current-input-port))"), "#T");
        assert_eq!(eval_one("(output-port? (current-output-port))"), "#T");
        assert_eq!(eval_one("(input-port? (current-output-port))"), "#F");
    }

    #[test]
    fn test_eq_family() {
        assert_eq!(eval_one("(eq? 'a 'a)"), "#T");
        assert_eq!(eval_one("(eq? '(a) '(a))"), "#F");
        assert_eq!(eval_one("(eqv? 3 3)"), "#T");
        assert_eq!(eval_one("(eqv? 3 3.0)"), "#F");
        assert_eq!(eval_one("(eqv? #\\x #\\x)"), "#T");
        assert_eq!(eval_one("(equal? '(1 (2)) '(1 (2)))"), "#T");
        assert_eq!(eval_one("(equal? \"ab\" \"ab\")"), "#T");
        assert_eq!(eval_one("(equal? #(1 2) #(1 2))"), "#T");
        assert_eq!(eval_one("(equal? '(1) '(2))"), "#F");
    }

    #[test]
    fn test_not() {
        assert_eq!(eval_one("(not #f)"), "#T");
        assert_eq!(eval_one("(not '())"), "#T");
        assert_eq!(eval_one("(not 1)"), "#F");
    }
}
