//! Numeric primitives.
//!
//! The tower is integers and floats only; mixed operands promote pairwise
//! to float. `+` and `*` fold over any number of arguments, `-` and `/`
//! fold left with the usual one-argument special cases. Comparisons are
//! binary. Integer arithmetic wraps silently, as the source machine's did.

use crate::backend::cell::{Cell, CellRef};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_float(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(x) => x,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(x) => x == 0.0,
        }
    }
}

fn num_of(it: &Interp, r: CellRef, who: &str) -> EvalResult<Num> {
    match it.cell(r) {
        Cell::Int(i) => Ok(Num::Int(*i)),
        Cell::Float(x) => Ok(Num::Float(*x)),
        _ => Err(SchemeError::Runtime(format!("{} requires numbers.", who))),
    }
}

fn push_num(it: &mut Interp, n: Num) -> EvalResult<()> {
    let cell = match n {
        Num::Int(i) => it.int(i),
        Num::Float(x) => it.float(x),
    };
    it.vals.push(cell)
}

/// Pop the whole variadic argument group, restoring evaluation order.
fn pop_args(it: &mut Interp, who: &str) -> EvalResult<Vec<Num>> {
    let mut args = Vec::new();
    loop {
        let v = it.vals.pop()?;
        if v == it.mark {
            break;
        }
        args.push(num_of(it, v, who)?);
    }
    args.reverse();
    Ok(args)
}

fn fold2(a: Num, b: Num, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Num::Int(int_op(x, y)),
        _ => Num::Float(float_op(a.as_float(), b.as_float())),
    }
}

/// (+ n ...)
pub fn op_add(it: &mut Interp) -> EvalResult<()> {
    let args = pop_args(it, "+")?;
    let sum = args
        .into_iter()
        .fold(Num::Int(0), |acc, n| fold2(acc, n, i64::wrapping_add, |a, b| a + b));
    push_num(it, sum)
}

/// (* n ...)
pub fn op_mul(it: &mut Interp) -> EvalResult<()> {
    let args = pop_args(it, "*")?;
    let product = args
        .into_iter()
        .fold(Num::Int(1), |acc, n| fold2(acc, n, i64::wrapping_mul, |a, b| a * b));
    push_num(it, product)
}

/// (- n ...) - negation with one argument.
pub fn op_sub(it: &mut Interp) -> EvalResult<()> {
    let args = pop_args(it, "-")?;
    let result = match args.len() {
        0 => Num::Int(0),
        1 => match args[0] {
            Num::Int(i) => Num::Int(i.wrapping_neg()),
            Num::Float(x) => Num::Float(-x),
        },
        _ => args[1..]
            .iter()
            .fold(args[0], |acc, &n| fold2(acc, n, i64::wrapping_sub, |a, b| a - b)),
    };
    push_num(it, result)
}

/// (/ n ...) - reciprocal with one argument; division by zero is trapped.
pub fn op_div(it: &mut Interp) -> EvalResult<()> {
    let args = pop_args(it, "/")?;
    let result = match args.len() {
        0 => return Err(SchemeError::Runtime("/ requires numbers.".to_string())),
        1 => {
            if args[0].is_zero() {
                return Err(SchemeError::DivisionByZero);
            }
            Num::Float(1.0 / args[0].as_float())
        }
        _ => {
            let mut acc = args[0];
            for &n in &args[1..] {
                if n.is_zero() {
                    return Err(SchemeError::DivisionByZero);
                }
                acc = fold2(acc, n, i64::wrapping_div, |a, b| a / b);
            }
            acc
        }
    };
    push_num(it, result)
}

/// (ABS n)
pub fn op_abs(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    let n = num_of(it, v, "ABS")?;
    let result = match n {
        Num::Int(i) => Num::Int(i.wrapping_abs()),
        Num::Float(x) => Num::Float(x.abs()),
    };
    push_num(it, result)
}

fn compare(it: &mut Interp, who: &str, cmp: fn(f64, f64) -> bool) -> EvalResult<()> {
    let b = it.vals.pop()?;
    let a = it.vals.pop()?;
    let x = num_of(it, a, who)?;
    let y = num_of(it, b, who)?;
    let result = it.boolean(cmp(x.as_float(), y.as_float()));
    it.vals.push(result)
}

/// (< a b)
pub fn op_lt(it: &mut Interp) -> EvalResult<()> {
    compare(it, "<", |a, b| a < b)
}

/// (> a b)
pub fn op_gt(it: &mut Interp) -> EvalResult<()> {
    compare(it, ">", |a, b| a > b)
}

/// (<= a b)
pub fn op_le(it: &mut Interp) -> EvalResult<()> {
    compare(it, "<=", |a, b| a <= b)
}

/// (>= a b)
pub fn op_ge(it: &mut Interp) -> EvalResult<()> {
    compare(it, ">=", |a, b| a >= b)
}

/// (= a b)
pub fn op_num_eq(it: &mut Interp) -> EvalResult<()> {
    compare(it, "=", |a, b| a == b)
}

/// (<> a b)
pub fn op_num_ne(it: &mut Interp) -> EvalResult<()> {
    compare(it, "<>", |a, b| a != b)
}

/// (POSITIVE? n)
pub fn op_positive(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    let n = num_of(it, v, "POSITIVE?")?;
    let result = it.boolean(n.as_float() > 0.0);
    it.vals.push(result)
}

/// (NEGATIVE? n)
pub fn op_negative(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    let n = num_of(it, v, "NEGATIVE?")?;
    let result = it.boolean(n.as_float() < 0.0);
    it.vals.push(result)
}

/// (ODD? n)
pub fn op_odd(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    match it.cell(v) {
        Cell::Int(i) => {
            let result = it.boolean(i % 2 != 0);
            it.vals.push(result)
        }
        _ => Err(SchemeError::Runtime("ODD? requires an integer.".to_string())),
    }
}

/// (EVEN? n)
pub fn op_even(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    match it.cell(v) {
        Cell::Int(i) => {
            let result = it.boolean(i % 2 == 0);
            it.vals.push(result)
        }
        _ => Err(SchemeError::Runtime("EVEN? requires an integer.".to_string())),
    }
}

fn extremum(it: &mut Interp, who: &str, pick_first: fn(f64, f64) -> bool) -> EvalResult<()> {
    let args = pop_args(it, who)?;
    let mut best = args[0];
    let mut promote = matches!(best, Num::Float(_));
    for &n in &args[1..] {
        promote = promote || matches!(n, Num::Float(_));
        if !pick_first(best.as_float(), n.as_float()) {
            best = n;
        }
    }
    if promote {
        best = Num::Float(best.as_float());
    }
    push_num(it, best)
}

/// (MAX n ...)
pub fn op_max(it: &mut Interp) -> EvalResult<()> {
    extremum(it, "MAX", |a, b| a >= b)
}

/// (MIN n ...)
pub fn op_min(it: &mut Interp) -> EvalResult<()> {
    extremum(it, "MIN", |a, b| a <= b)
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;

    fn eval_one(src: &str) -> String {
        let mut it = Interp::new().unwrap();
        it.eval_str(src).unwrap().pop().unwrap()
    }

    fn eval_err(src: &str) -> String {
        let mut it = Interp::new().unwrap();
        it.eval_str(src).unwrap_err().to_string()
    }

    #[test]
    fn test_addition() {
        assert_eq!(eval_one("(+)"), "0");
        assert_eq!(eval_one("(+ 5)"), "5");
        assert_eq!(eval_one("(+ 1 2 3)"), "6");
        assert_eq!(eval_one("(+ 1 2.5)"), "3.5");
    }

    #[test]
    fn test_subtraction() {
        assert_eq!(eval_one("(- 5)"), "-5");
        assert_eq!(eval_one("(- 10 3 2)"), "5");
        assert_eq!(eval_one("(- 1.5 1)"), "0.5");
    }

    #[test]
    fn test_multiplication() {
        assert_eq!(eval_one("(*)"), "1");
        assert_eq!(eval_one("(* 2 3 4)"), "24");
    }

    #[test]
    fn test_division() {
        assert_eq!(eval_one("(/ 10 2)"), "5");
        assert_eq!(eval_one("(/ 7 2)"), "3");
        assert_eq!(eval_one("(/ 2.0)"), "0.5");
        assert_eq!(eval_one("(/ 9.0 2)"), "4.5");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval_err("(/ 1 0)"), "Division by zero");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval_one("(< 1 2)"), "#T");
        assert_eq!(eval_one("(> 1 2)"), "#F");
        assert_eq!(eval_one("(<= 2 2)"), "#T");
        assert_eq!(eval_one("(>= 1 2)"), "#F");
        assert_eq!(eval_one("(= 3 3)"), "#T");
        assert_eq!(eval_one("(= 3 3.0)"), "#T");
        assert_eq!(eval_one("(<> 3 4)"), "#T");
    }

    #[test]
    fn test_abs() {
        assert_eq!(eval_one("(abs -4)"), "4");
        assert_eq!(eval_one("(abs 4)"), "4");
        assert_eq!(eval_one("(abs -1.5)"), "1.5");
    }

    #[test]
    fn test_sign_and_parity_predicates() {
        assert_eq!(eval_one("(positive? 3)"), "#T");
        assert_eq!(eval_one("(negative? -3)"), "#T");
        assert_eq!(eval_one("(odd? 3)"), "#T");
        assert_eq!(eval_one("(even? 4)"), "#T");
        assert_eq!(eval_one("(odd? 4)"), "#F");
    }

    #[test]
    fn test_max_min() {
        assert_eq!(eval_one("(max 1 5 3)"), "5");
        assert_eq!(eval_one("(min 1 5 3)"), "1");
        assert_eq!(eval_one("(max 1 2.5)"), "2.5");
    }

    #[test]
    fn test_type_error_message() {
        assert_eq!(eval_err("(+ 1 'a)"), "+ requires numbers.");
    }
}
