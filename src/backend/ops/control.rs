//! Control primitives (`eval`, `apply`, `call/cc`, `*compile*`) and
//! interpreter directives.

use crate::backend::cell::Cell;
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::{Interp, StackSel};

/// (EVAL expr [env]) - with an environment argument, the caller's whole
/// environment cell is saved on the expression stack and restored when the
/// evaluation unwinds past it.
pub fn op_eval(it: &mut Interp) -> EvalResult<()> {
    let first = it.vals.pop()?;
    let second = it.vals.pop()?;

    let exp = if second == it.mark {
        first
    } else {
        it.vals.pop()?; // mark
        let env = first;
        if !matches!(it.cell(env), Cell::Environment { .. }) {
            return Err(SchemeError::Runtime(format!(
                "EVAL: Not an environment: {}",
                it.write_string(env)
            )));
        }
        let old_env = it.env;
        it.exprs.push(old_env)?;
        it.exprs.push(it.restore)?;
        it.env = env;
        second
    };

    it.exprs.push(exp)
}

/// (APPLY func arg-list)
pub fn op_apply(it: &mut Interp) -> EvalResult<()> {
    let args = it.vals.pop()?;
    let func = it.vals.pop()?;
    it.call_func(func, args)
}

/// (CALL/CC func) - reify the machine state and hand it to `func`.
pub fn op_call_cc(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let func = it.vals.pop()?;
    it.reg_push(func);

    let env = it.nested_env();
    let exprs = it.capture_stack(StackSel::Expr);
    it.reg_push(exprs);
    let vals = it.capture_stack(StackSel::Val);
    it.reg_push(vals);
    let funcs = it.capture_stack(StackSel::Func);
    it.reg_push(funcs);

    let cont = it.alloc(Cell::Continuation { env, exprs, vals, funcs });
    it.reg_push(cont);
    let args = it.cons(cont, it.nil);
    it.call_func(func, args)?;
    it.reg_release(rm);
    Ok(())
}

/// (*COMPILE* expr)
pub fn op_compile(it: &mut Interp) -> EvalResult<()> {
    let exp = it.vals.pop()?;
    let bc = it.compile_expr(exp)?;
    it.vals.push(bc)
}

/// (THE-ENVIRONMENT)
pub fn op_the_environment(it: &mut Interp) -> EvalResult<()> {
    let env = it.env;
    it.vals.push(env)
}

/// (EXIT) / (QUIT) / (BYE)
pub fn op_exit(_it: &mut Interp) -> EvalResult<()> {
    std::process::exit(0);
}

/// (TORTURE) - toggle collect-before-every-allocation; returns the new
/// state.
pub fn op_torture(it: &mut Interp) -> EvalResult<()> {
    it.heap.torture = !it.heap.torture;
    let state = if it.heap.torture { it.t } else { it.nil };
    it.vals.push(state)
}

/// (GCDEBUG) - toggle collection statistics.
pub fn op_gc_debug(it: &mut Interp) -> EvalResult<()> {
    it.gc_debug = !it.gc_debug;
    let state = if it.gc_debug { it.t } else { it.nil };
    it.vals.push(state)
}

/// (EVDEBUG) - toggle evaluator stack traces.
pub fn op_ev_debug(it: &mut Interp) -> EvalResult<()> {
    it.eval_debug = !it.eval_debug;
    let state = if it.eval_debug { it.t } else { it.nil };
    it.vals.push(state)
}

/// (ERROR obj ...) - display the arguments and unwind to top level.
pub fn op_error(it: &mut Interp) -> EvalResult<()> {
    let mut parts = Vec::new();
    loop {
        let v = it.vals.pop()?;
        if v == it.mark {
            break;
        }
        parts.push(it.display_string(v));
    }
    parts.reverse();
    Err(SchemeError::Runtime(parts.join(" ")))
}

/// (GENSYM)
pub fn op_gensym(it: &mut Interp) -> EvalResult<()> {
    let sym = it.gensym()?;
    it.vals.push(sym)
}

/// (CHDIR string)
pub fn op_chdir(it: &mut Interp) -> EvalResult<()> {
    let name = it.vals.pop()?;
    let path = match it.cell(name) {
        Cell::Str(s) => s.clone(),
        _ => return Err(SchemeError::Runtime("CHDIR: Requires a string.".to_string())),
    };
    let result = if std::env::set_current_dir(&path).is_ok() { name } else { it.f };
    it.vals.push(result)
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;

    fn eval_all(src: &str) -> Vec<String> {
        let mut it = Interp::new().unwrap();
        it.eval_str(src).unwrap()
    }

    #[test]
    fn test_the_environment_is_an_environment() {
        assert_eq!(eval_all("(the-environment)")[0], "#<Environment>");
    }

    #[test]
    fn test_torture_toggles() {
        let out = eval_all("(torture) (torture)");
        assert_eq!(out, vec!["#T", "()"]);
    }

    #[test]
    fn test_error_unwinds_with_message() {
        let mut it = Interp::new().unwrap();
        let err = it.eval_str("(error \"bad\" 'thing 42)").unwrap_err();
        assert_eq!(err.to_string(), "bad THING 42");
    }

    #[test]
    fn test_gensym_is_fresh() {
        let out = eval_all("(eq? (gensym) (gensym))");
        assert_eq!(out[0], "#F");
    }

    #[test]
    fn test_gensym_avoids_existing_symbols() {
        // G0 is taken before the first gensym call; the result must differ.
        let out = eval_all("(define g0 'used) (symbol->string (gensym))");
        assert_ne!(out[1], "\"G0\"");
    }

    #[test]
    fn test_compile_returns_bytecode() {
        let out = eval_all("(*compile* '(+ 1 2))");
        assert!(out[0].starts_with("#<Code,"));
    }
}
