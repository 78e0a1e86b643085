//! Special forms: `quote`, `lambda`, `define`, `set!`, `if`, `begin`,
//! `or`, `and`, `macro`.
//!
//! Entry handlers take their unevaluated arguments off the expression stack
//! (the first argument is on top, the caller's call marker below the last).
//! Forms that need a sub-expression's value park their state on the value
//! stack, push a `Resume` cell, and let the evaluator loop drive; the
//! resume handler finishes the job. A form whose final sub-expression needs
//! no follow-up pushes it without a resume underneath - that is the whole
//! tail-call story.
//!
//! `bc_define`/`bc_set` are the bytecode-side variants: the compiler
//! already arranged the symbol and the evaluated value on the value stack.

use crate::backend::cell::{Cell, CellRef, ResumeKind};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

/// (QUOTE x)
pub fn op_quote(it: &mut Interp) -> EvalResult<()> {
    let x = it.exprs.pop()?;
    it.exprs.pop()?; // call marker
    it.vals.push(x)
}

/// (LAMBDA params body...)
pub fn op_lambda(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let form = it.gather_exprs()?;
    it.reg_push(form);
    let params = it.car(form);
    let body = it.cdr(form);
    let env = it.nested_env();
    let close = it.closure(params, body, env);
    it.vals.push(close)?;
    it.reg_release(rm);
    Ok(())
}

/// (DEFINE sym expr) and the shorthand (DEFINE (name . params) body...).
pub fn op_define(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let form = it.gather_exprs()?;
    it.reg_push(form);

    let target = it.car(form);
    if it.is_pair(target) {
        // (define (name . params) body...) builds the closure directly and
        // silently replaces any existing binding.
        let params = it.cdr(target);
        let body = it.cdr(form);
        let env = it.nested_env();
        let close = it.closure(params, body, env);
        let name = it.car(target);
        it.def_global(name, close)?;
        it.vals.push(name)?;
        it.reg_release(rm);
        return Ok(());
    }

    if !it.is_symbol(target) {
        return Err(SchemeError::Runtime(format!(
            "DEFINE: Can't bind to non-symbol: {}",
            it.write_string(target)
        )));
    }

    // Park the symbol, evaluate the expression, resume.
    it.vals.push(target)?;
    it.vals.push(it.mark)?;
    let res = it.alloc(Cell::Resume(ResumeKind::Define));
    it.exprs.push(res)?;
    let expr = it.cadr(form);
    it.exprs.push(expr)?;
    it.reg_release(rm);
    Ok(())
}

pub fn res_define(it: &mut Interp) -> EvalResult<()> {
    let value = it.vals.pop()?;
    it.vals.pop()?; // mark
    let sym = it.vals.pop()?;
    if it.acc_global(sym).is_some() {
        return Err(SchemeError::Runtime(format!(
            "DEFINE: Symbol already defined: {}",
            it.sym_name(sym)
        )));
    }
    it.def_global(sym, value)?;
    it.vals.push(sym)
}

/// (SET! sym expr)
pub fn op_set(it: &mut Interp) -> EvalResult<()> {
    let sym = it.exprs.pop()?;
    let expr = it.exprs.pop()?;
    it.exprs.pop()?; // call marker

    if !it.is_symbol(sym) {
        return Err(SchemeError::Runtime(format!(
            "SET!: Can't bind to non-symbol: {}",
            it.write_string(sym)
        )));
    }

    let rm = it.reg_mark();
    it.reg_push(expr);
    it.vals.push(sym)?;
    it.vals.push(it.mark)?;
    let res = it.alloc(Cell::Resume(ResumeKind::Set));
    it.exprs.push(res)?;
    it.exprs.push(expr)?;
    it.reg_release(rm);
    Ok(())
}

pub fn res_set(it: &mut Interp) -> EvalResult<()> {
    let value = it.vals.pop()?;
    it.vals.pop()?; // mark
    let sym = it.vals.pop()?;
    set_symbol(it, sym, value)?;
    it.vals.push(sym)
}

/// Update the nearest nested binding, else the global, else error.
fn set_symbol(it: &mut Interp, sym: CellRef, value: CellRef) -> EvalResult<()> {
    if let Some(binding) = it.acc_nested(sym) {
        it.set_cdr(binding, value)
    } else if it.acc_global(sym).is_some() {
        it.def_global(sym, value)
    } else {
        Err(SchemeError::Runtime(format!("SET!: Symbol undefined: {}", it.sym_name(sym))))
    }
}

/// (IF condition consequence [alternate])
pub fn op_if(it: &mut Interp) -> EvalResult<()> {
    let cond = it.exprs.pop()?;
    let cons = it.exprs.pop()?;
    let third = it.exprs.pop()?;
    let alt = if third == it.call {
        // Two-argument if: keep the call marker as the "no alternate" tag.
        it.call
    } else {
        it.exprs.pop()?; // call marker
        third
    };

    let rm = it.reg_mark();
    it.reg_push(cond);
    it.vals.push(alt)?;
    it.vals.push(cons)?;
    it.vals.push(it.mark)?;
    let res = it.alloc(Cell::Resume(ResumeKind::If));
    it.exprs.push(res)?;
    it.exprs.push(cond)?;
    it.reg_release(rm);
    Ok(())
}

pub fn res_if(it: &mut Interp) -> EvalResult<()> {
    let value = it.vals.pop()?;
    it.vals.pop()?; // mark
    let cons = it.vals.pop()?;
    let alt = it.vals.pop()?;

    if it.is_false(value) {
        if alt == it.call {
            // No alternate: the value of if is the (false) condition.
            it.vals.push(value)
        } else {
            it.exprs.push(alt)
        }
    } else {
        it.exprs.push(cons)
    }
}

/// Pop the pending argument expressions (first on top) down to the call
/// marker.
fn pending_args(it: &mut Interp) -> EvalResult<Vec<CellRef>> {
    let mut args = Vec::new();
    loop {
        let e = it.exprs.pop()?;
        if e == it.call {
            return Ok(args);
        }
        args.push(e);
    }
}

/// Arrange a begin/or/and chain: mark, then the expressions with the first
/// on top, then a dummy result for the first resume round to discard.
fn start_chain(it: &mut Interp, args: &[CellRef], dummy: CellRef) -> EvalResult<()> {
    it.vals.push(it.mark)?;
    for &e in args.iter().rev() {
        it.vals.push(e)?;
    }
    it.vals.push(dummy)
}

/// (BEGIN e...)
pub fn op_begin(it: &mut Interp) -> EvalResult<()> {
    let args = pending_args(it)?;
    if args.is_empty() {
        // (BEGIN) => () though it could be flagged as an error.
        return it.vals.push(it.nil);
    }
    start_chain(it, &args, it.nil)?;
    let res = it.alloc(Cell::Resume(ResumeKind::Begin));
    res_begin(it, res)
}

pub fn res_begin(it: &mut Interp, res: CellRef) -> EvalResult<()> {
    it.vals.pop()?; // previous expression's value
    let exp = it.vals.pop()?;
    // The last expression runs without a resume underneath: tail position.
    if it.vals.top() == Some(it.mark) {
        it.vals.pop()?;
    } else {
        it.exprs.push(res)?;
    }
    it.exprs.push(exp)
}

/// (OR e...) - value of the first non-false expression.
pub fn op_or(it: &mut Interp) -> EvalResult<()> {
    let args = pending_args(it)?;
    if args.is_empty() {
        return it.vals.push(it.f);
    }
    start_chain(it, &args, it.nil)?;
    let res = it.alloc(Cell::Resume(ResumeKind::Or));
    res_or(it, res)
}

pub fn res_or(it: &mut Interp, res: CellRef) -> EvalResult<()> {
    let result = it.vals.pop()?;
    if !it.is_false(result) {
        discard_to_mark(it)?;
        return it.vals.push(result);
    }
    let exp = it.vals.pop()?;
    if it.vals.top() == Some(it.mark) {
        it.vals.pop()?;
    } else {
        it.exprs.push(res)?;
    }
    it.exprs.push(exp)
}

/// (AND e...) - false as soon as an expression is false.
pub fn op_and(it: &mut Interp) -> EvalResult<()> {
    let args = pending_args(it)?;
    if args.is_empty() {
        return it.vals.push(it.t);
    }
    start_chain(it, &args, it.t)?;
    let res = it.alloc(Cell::Resume(ResumeKind::And));
    res_and(it, res)
}

pub fn res_and(it: &mut Interp, res: CellRef) -> EvalResult<()> {
    let result = it.vals.pop()?;
    if it.is_false(result) {
        discard_to_mark(it)?;
        return it.vals.push(result);
    }
    let exp = it.vals.pop()?;
    if it.vals.top() == Some(it.mark) {
        it.vals.pop()?;
    } else {
        it.exprs.push(res)?;
    }
    it.exprs.push(exp)
}

fn discard_to_mark(it: &mut Interp) -> EvalResult<()> {
    while !it.vals.is_empty() {
        if it.vals.pop()? == it.mark {
            break;
        }
    }
    Ok(())
}

/// (MACRO sym expr) - evaluate expr to an expander and record it in the
/// expansion table under sym.
pub fn op_macro(it: &mut Interp) -> EvalResult<()> {
    let sym = it.exprs.pop()?;
    let func = it.exprs.pop()?;
    it.exprs.pop()?; // call marker

    if !it.is_symbol(sym) {
        return Err(SchemeError::Runtime(format!(
            "MACRO: Can't make macro of non-symbol: {}",
            it.write_string(sym)
        )));
    }

    let rm = it.reg_mark();
    it.reg_push(func);
    it.vals.push(sym)?;
    let res = it.alloc(Cell::Resume(ResumeKind::Macro));
    it.exprs.push(res)?;
    it.exprs.push(func)?;
    it.reg_release(rm);
    Ok(())
}

pub fn res_macro(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let expander = it.vals.pop()?;
    it.reg_push(expander);
    let name = it.vals.pop()?;
    it.reg_push(name);

    let table = it.acc_global(it.exp_table).unwrap_or(it.nil);
    let existing = it.sym_id(name).and_then(|id| it.assq_id(id, table));
    match existing {
        Some(binding) => it.set_cdr(binding, expander)?,
        None => {
            let binding = it.cons(name, expander);
            let table = it.acc_global(it.exp_table).unwrap_or(it.nil);
            let extended = it.cons(binding, table);
            let exp_table = it.exp_table;
            it.def_global(exp_table, extended)?;
        }
    }
    it.vals.push(name)?;
    it.reg_release(rm);
    Ok(())
}

/// Compiled (DEFINE sym expr): the value is on top, the symbol beneath.
pub fn bc_define(it: &mut Interp) -> EvalResult<()> {
    let value = it.vals.pop()?;
    let sym = it.vals.pop()?;
    if !it.is_symbol(sym) {
        return Err(SchemeError::Runtime(format!(
            "DEFINE: Can't bind to non-symbol: {}",
            it.write_string(sym)
        )));
    }
    if it.acc_global(sym).is_some() {
        return Err(SchemeError::Runtime(format!(
            "DEFINE: Symbol already defined: {}",
            it.sym_name(sym)
        )));
    }
    it.def_global(sym, value)?;
    it.vals.push(sym)
}

/// Compiled (SET! sym expr).
pub fn bc_set(it: &mut Interp) -> EvalResult<()> {
    let value = it.vals.pop()?;
    let sym = it.vals.pop()?;
    set_symbol(it, sym, value)?;
    it.vals.push(sym)
}
