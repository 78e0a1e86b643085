//! The tree-walking evaluator.
//!
//! A single dispatch loop over the expression stack. Scheme-level recursion
//! never touches the host call stack: special forms that need the value of a
//! sub-expression suspend themselves with a `Resume` cell (the resume
//! protocol), closures push their bodies, and the bytecode interpreter saves
//! execution points. This is what makes continuations capturable and proper
//! tail calls free.
//!
//! Argument evaluation order is left to right: a combination pushes its
//! arguments right-to-left onto the expression stack so they pop (and
//! evaluate) left-to-right, leaving the last argument's value on top of the
//! value stack.

use tracing::trace;

use super::cell::{Cell, CellRef, PortDir, ResumeKind};
use super::error::{EvalResult, SchemeError};
use super::interp::{Interp, StackSel};
use super::ops;
use super::ports::PortState;

impl Interp {
    /// Evaluate until the expression stack is empty. Results accumulate on
    /// the value stack.
    pub fn eval(&mut self) -> EvalResult<()> {
        let rm = self.reg_mark();
        let exp_reg = self.reg_push(self.nil);
        let func_reg = self.reg_push(self.nil);
        let result = self.eval_loop(exp_reg, func_reg);
        if result.is_ok() {
            self.reg_release(rm);
        }
        result
    }

    fn eval_loop(&mut self, exp_reg: usize, func_reg: usize) -> EvalResult<()> {
        while !self.exprs.is_empty() {
            self.trace_stacks("eval step");

            let exp = self.exprs.pop()?;
            self.set_reg(exp_reg, exp);

            if exp == self.nil {
                // (eval '()) => () for compatibility, though the standard
                // calls it illegal syntax.
                self.vals.push(self.nil)?;
            } else if exp == self.pushfunc {
                let func = self.vals.pop()?;
                self.set_reg(func_reg, func);
                self.funcs.push(func)?;
                if let Cell::Primitive(pid) = self.cell(func) {
                    let def = ops::prim(*pid);
                    self.count_args(def)?;
                    if def.is_variadic() {
                        self.vals.push(self.mark)?;
                    }
                } else {
                    // User callables always get a mark; the binder pops it.
                    self.vals.push(self.mark)?;
                }
            } else if exp == self.call {
                let func = self.funcs.pop()?;
                self.set_reg(func_reg, func);
                trace!(target: "schemetron::eval", "invoking {}", self.write_string(func));
                self.apply(func)?;
            } else if matches!(self.cell(exp), Cell::Bytecode { .. } | Cell::ExecPoint { .. }) {
                self.run_bytecode(exp)?;
            } else if exp == self.restore {
                let saved = self.exprs.pop()?;
                if matches!(self.cell(saved), Cell::Environment { .. }) {
                    // A whole-environment save from (eval expr env).
                    self.env = saved;
                } else {
                    self.set_nested(saved);
                }
            } else if let Cell::Resume(kind) = self.cell(exp) {
                let kind = *kind;
                self.invoke_resume(kind, exp)?;
            } else if self.is_atom(exp) {
                let value = self.eval_atom(exp)?;
                self.set_reg(exp_reg, value);
                if matches!(self.cell(value), Cell::SpecialForm(_) | Cell::UserForm { .. }) {
                    // Special forms run before their arguments are evaluated.
                    self.invoke_form(value)?;
                } else {
                    self.vals.push(value)?;
                }
            } else {
                // A combination (f a1 ...).
                if self.expand_once(exp)? {
                    continue;
                }
                self.exprs.push(self.call)?;
                let f = self.car(exp);
                let mut args = Vec::new();
                let mut curr = self.cdr(exp);
                while self.is_pair(curr) {
                    args.push(self.car(curr));
                    curr = self.cdr(curr);
                }
                for &a in args.iter().rev() {
                    self.exprs.push(a)?;
                }
                self.exprs.push(self.pushfunc)?;
                self.exprs.push(f)?;
            }
        }
        Ok(())
    }

    /// Evaluate an atom in the current environment.
    fn eval_atom(&mut self, atom: CellRef) -> EvalResult<CellRef> {
        match self.cell(atom) {
            Cell::True
            | Cell::False
            | Cell::Eof
            | Cell::Int(_)
            | Cell::Float(_)
            | Cell::Str(_)
            | Cell::Char(_)
            | Cell::Vector(_) => Ok(atom),
            Cell::Symbol(_) => {
                if let Some(binding) = self.acc_nested(atom) {
                    Ok(self.cdr(binding))
                } else if let Some(value) = self.acc_global(atom) {
                    Ok(value)
                } else {
                    Err(SchemeError::UndefinedSymbol(self.sym_name(atom).to_string()))
                }
            }
            other => Err(SchemeError::Runtime(format!(
                "EVAL: Can't evaluate non-symbol: {}",
                other.kind_name()
            ))),
        }
    }

    // === Apply ===

    /// Apply a callable to the arguments on the value stack.
    pub fn apply(&mut self, func: CellRef) -> EvalResult<()> {
        match self.cell(func) {
            Cell::Closure { params, body, env } => {
                let (params, body, env) = (*params, *body, *env);
                self.invoke_user_func(params, body, env)
            }
            Cell::Continuation { .. } => self.invoke_cont(func),
            Cell::Primitive(pid) => {
                // Arity was checked when the function moved to its stack.
                let def = ops::prim(*pid);
                (def.handler)(self)
            }
            _ => Err(SchemeError::Runtime(format!(
                "APPLY: Can't apply the non-function {}",
                self.write_string(func)
            ))),
        }
    }

    /// Call a closure: save the caller's environment (unless a return is
    /// already pending right above us, the tail-call rule), bind arguments
    /// against the parameter spec, run the body.
    fn invoke_user_func(&mut self, params: CellRef, body: CellRef, env: CellRef) -> EvalResult<()> {
        self.save_env()?;
        let new_env = self.bind_args(params, env)?;
        self.set_nested(new_env);
        self.run_body(body)
    }

    /// User special forms bind their *unevaluated* argument expressions in
    /// the caller's environment.
    fn invoke_user_form(&mut self, params: CellRef, body: CellRef) -> EvalResult<()> {
        self.save_env()?;
        let caller_env = self.nested_env();
        let new_env = self.bind_form_args(params, caller_env)?;
        self.set_nested(new_env);
        self.run_body(body)
    }

    fn run_body(&mut self, body: CellRef) -> EvalResult<()> {
        if matches!(self.cell(body), Cell::Bytecode { .. } | Cell::ExecPoint { .. }) {
            return self.run_bytecode(body);
        }
        // Let begin drive the body: push the expressions so the first one
        // is on top, then enter the form directly.
        self.exprs.push(self.call)?;
        let mut elems = Vec::new();
        let mut curr = body;
        while self.is_pair(curr) {
            elems.push(self.car(curr));
            curr = self.cdr(curr);
        }
        for &e in elems.iter().rev() {
            self.exprs.push(e)?;
        }
        ops::forms::op_begin(self)
    }

    /// Save the current nested environment for restoration after a call.
    /// Skipped when the top of the expression stack is already a `Restore`
    /// or an execution point: the pending return will restore an earlier
    /// environment anyway, which is exactly what eliminates stack growth on
    /// tail calls.
    pub fn save_env(&mut self) -> EvalResult<()> {
        let pending_return = match self.exprs.top() {
            Some(t) if t == self.restore => true,
            Some(t) => matches!(self.cell(t), Cell::ExecPoint { .. }),
            None => false,
        };
        if !pending_return {
            let nested = self.nested_env();
            self.exprs.push(nested)?;
            self.exprs.push(self.restore)?;
        }
        Ok(())
    }

    // === Argument binding ===

    /// Pop evaluated arguments (down to the mark) and bind them against
    /// `params`, extending `env`. `params` may be a proper list, an
    /// improper list `(a b . rest)`, or a single symbol binding everything.
    fn bind_args(&mut self, params: CellRef, env: CellRef) -> EvalResult<CellRef> {
        let args = self.gather_vals()?;
        self.bind_list(params, args, env, "function")
    }

    /// Pop unevaluated argument expressions (down to the call marker) and
    /// bind them; used for user special forms.
    fn bind_form_args(&mut self, params: CellRef, env: CellRef) -> EvalResult<CellRef> {
        let args = self.gather_exprs()?;
        self.bind_list(params, args, env, "form")
    }

    fn bind_list(
        &mut self,
        params: CellRef,
        args: CellRef,
        env: CellRef,
        what: &str,
    ) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        let params_slot = self.reg_push(params);
        let args_slot = self.reg_push(args);
        let env_slot = self.reg_push(env);

        loop {
            let params = self.reg(params_slot);
            let args = self.reg(args_slot);
            if self.is_nil(params) {
                if !self.is_nil(args) {
                    return Err(SchemeError::Runtime(format!(
                        "Too many args in call to {}.",
                        what
                    )));
                }
                break;
            }
            if self.is_atom(params) {
                // Rest parameter: bind the remaining arguments as a list.
                let binding = self.cons(params, args);
                let extended = self.cons(binding, self.reg(env_slot));
                self.set_reg(env_slot, extended);
                break;
            }
            if self.is_nil(args) {
                return Err(SchemeError::Runtime(format!("Too few args in call to {}.", what)));
            }
            let var = self.car(params);
            let value = self.car(args);
            let binding = self.cons(var, value);
            let extended = self.cons(binding, self.reg(env_slot));
            self.set_reg(env_slot, extended);
            let next_params = self.cdr(params);
            let next_args = self.cdr(args);
            self.set_reg(params_slot, next_params);
            self.set_reg(args_slot, next_args);
        }

        let result = self.reg(env_slot);
        self.reg_release(rm);
        Ok(result)
    }

    // === Continuations ===

    /// Invoke a continuation: replace all four stacks and the nested
    /// environment with the snapshots, then deliver the return value.
    fn invoke_cont(&mut self, cont: CellRef) -> EvalResult<()> {
        let rm = self.reg_mark();
        let val = self.vals.pop()?;
        self.reg_push(val);

        let (env, exprs, vals, funcs) = match self.cell(cont) {
            Cell::Continuation { env, exprs, vals, funcs } => (*env, *exprs, *vals, *funcs),
            _ => unreachable!("invoke_cont on a non-continuation"),
        };
        self.restore_stack(StackSel::Expr, exprs)?;
        self.restore_stack(StackSel::Val, vals)?;
        self.restore_stack(StackSel::Func, funcs)?;
        self.set_nested(env);

        self.vals.push(val)?;
        self.reg_release(rm);
        Ok(())
    }

    // === Special forms ===

    /// Invoke a special form whose symbol just evaluated in head position.
    fn invoke_form(&mut self, form: CellRef) -> EvalResult<()> {
        // Not in call position: nothing to do (source behavior).
        if self.exprs.top() != Some(self.pushfunc) {
            return Ok(());
        }
        self.exprs.pop()?;

        match self.cell(form) {
            Cell::UserForm { params, body } => {
                let (params, body) = (*params, *body);
                self.invoke_user_form(params, body)
            }
            Cell::SpecialForm(pid) => {
                let def = ops::prim(*pid);
                self.count_args(def)?;
                (def.handler)(self)
            }
            _ => unreachable!("invoke_form on a non-form"),
        }
    }

    /// Dispatch a popped `Resume` cell to its form's resume handler.
    fn invoke_resume(&mut self, kind: ResumeKind, cell: CellRef) -> EvalResult<()> {
        trace!(target: "schemetron::eval", resume = ?kind, "resuming");
        match kind {
            ResumeKind::Define => ops::forms::res_define(self),
            ResumeKind::Set => ops::forms::res_set(self),
            ResumeKind::If => ops::forms::res_if(self),
            ResumeKind::Begin => ops::forms::res_begin(self, cell),
            ResumeKind::Or => ops::forms::res_or(self, cell),
            ResumeKind::And => ops::forms::res_and(self, cell),
            ResumeKind::Macro => ops::forms::res_macro(self),
            ResumeKind::Expand => self.res_expand(),
            ResumeKind::Load => ops::io::res_load(self, cell),
        }
    }

    // === Arity checking ===

    /// Count the pending arguments on the expression stack (down to the
    /// call marker) against a primitive's arity.
    fn count_args(&mut self, def: &ops::PrimDef) -> EvalResult<()> {
        let mut n = 0;
        for i in (0..self.exprs.len()).rev() {
            if self.exprs.get(i) == self.call {
                break;
            }
            n += 1;
        }
        ops::check_arity(def, n)
    }

    // === Gathering ===

    /// Pop values down to the mark into a list, preserving evaluation
    /// order (the first argument's value is deepest on the stack).
    pub fn gather_vals(&mut self) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        let acc = self.reg_push(self.nil);
        loop {
            let v = self.vals.pop()?;
            if v == self.mark {
                break;
            }
            let lst = self.cons(v, self.reg(acc));
            self.set_reg(acc, lst);
        }
        let lst = self.reg(acc);
        self.reg_release(rm);
        Ok(lst)
    }

    /// Pop expressions down to the call marker into a list in source order
    /// (the first argument sits on top of the expression stack).
    pub fn gather_exprs(&mut self) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        let acc = self.reg_push(self.nil);
        loop {
            let e = self.exprs.pop()?;
            if e == self.call {
                break;
            }
            let lst = self.cons(e, self.reg(acc));
            self.set_reg(acc, lst);
        }
        let lst = self.reverse_in_place(self.reg(acc));
        self.reg_release(rm);
        Ok(lst)
    }

    /// Reverse a list by pointer surgery. The list must be freshly built
    /// and unshared.
    pub fn reverse_in_place(&mut self, list: CellRef) -> CellRef {
        let mut prev = self.nil;
        let mut curr = list;
        while self.is_pair(curr) {
            let next = self.cdr(curr);
            if let Cell::Pair { cdr, .. } = self.heap.get_mut(curr) {
                *cdr = prev;
            }
            prev = curr;
            curr = next;
        }
        prev
    }

    // === Calling from primitives (apply, call/cc, the expander) ===

    /// Arrange the stacks to call `func` with the already-evaluated
    /// argument list `args`, as if the combination had just been evaluated.
    pub fn call_func(&mut self, func: CellRef, args: CellRef) -> EvalResult<()> {
        let rm = self.reg_mark();
        self.reg_push(func);
        self.reg_push(args);

        self.exprs.push(self.call)?;
        self.funcs.push(func)?;

        match self.cell(func) {
            Cell::Primitive(pid) => {
                let def = ops::prim(*pid);
                ops::check_arity(def, self.list_len(args))?;
                if def.is_variadic() {
                    self.vals.push(self.mark)?;
                }
            }
            Cell::Continuation { .. } => {}
            _ => self.vals.push(self.mark)?,
        }

        if self.is_atom(args) && !self.is_nil(args) {
            self.vals.push(args)?;
        } else {
            let mut curr = args;
            while self.is_pair(curr) {
                let v = self.car(curr);
                self.vals.push(v)?;
                curr = self.cdr(curr);
            }
        }
        self.reg_release(rm);
        Ok(())
    }

    // === Macro expansion ===

    /// If the head of `exp` has an expander in the expansion table, set up
    /// to call the expander on the whole form and return true.
    fn expand_once(&mut self, exp: CellRef) -> EvalResult<bool> {
        let head = self.car(exp);
        let Some(id) = self.sym_id(head) else {
            return Ok(false);
        };
        let Some(table) = self.acc_global(self.exp_table) else {
            return Ok(false);
        };
        if self.is_nil(table) {
            return Ok(false);
        }
        let Some(binding) = self.assq_id(id, table) else {
            return Ok(false);
        };

        // The expander gets the original form as its only argument; its
        // result lands back on the expression stack via the expand resume.
        self.exprs.push(self.exp_resume)?;
        self.exprs.push(self.call)?;
        self.vals.push(self.mark)?;
        self.vals.push(exp)?;
        let expander = self.cdr(binding);
        self.funcs.push(expander)?;
        Ok(true)
    }

    fn res_expand(&mut self) -> EvalResult<()> {
        let result = self.vals.pop()?;
        self.exprs.push(result)
    }

    // === Whole-program helpers ===

    /// Read and evaluate every expression in `src`, returning the written
    /// form of each result. On error the machine is left as the error left
    /// it, for diagnostics; callers that continue should `clear_stacks`.
    pub fn eval_str(&mut self, src: &str) -> EvalResult<Vec<String>> {
        let rm = self.reg_mark();
        let port = self.add_port(PortState::from_string(src), PortDir::Input);
        self.reg_push(port);

        let mut out = Vec::new();
        loop {
            let exp = self.read(port)?;
            if exp == self.eof {
                break;
            }
            self.exprs.push(exp)?;
            self.eval()?;
            let v = self.vals.pop()?;
            out.push(self.write_string(v));
        }
        self.close_port(port);
        self.reg_release(rm);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_all(src: &str) -> Vec<String> {
        let mut it = Interp::new().unwrap();
        it.eval_str(src).unwrap()
    }

    fn eval_one(src: &str) -> String {
        eval_all(src).pop().unwrap()
    }

    #[test]
    fn test_self_evaluating_atoms() {
        assert_eq!(eval_one("42"), "42");
        assert_eq!(eval_one("3.5"), "3.5");
        assert_eq!(eval_one("\"hi\""), "\"hi\"");
        assert_eq!(eval_one("#\\a"), "#\\a");
        assert_eq!(eval_one("#T"), "#T");
        assert_eq!(eval_one("#F"), "#F");
        assert_eq!(eval_one("()"), "()");
    }

    #[test]
    fn test_undefined_symbol_errors() {
        let mut it = Interp::new().unwrap();
        let err = it.eval_str("no-such-thing").unwrap_err();
        assert_eq!(err, SchemeError::UndefinedSymbol("NO-SUCH-THING".to_string()));
    }

    #[test]
    fn test_quote() {
        assert_eq!(eval_one("'(a b c)"), "(A B C)");
        assert_eq!(eval_one("(quote x)"), "X");
    }

    #[test]
    fn test_define_and_lookup() {
        assert_eq!(eval_all("(define x 5) x"), vec!["X", "5"]);
    }

    #[test]
    fn test_define_twice_errors() {
        let mut it = Interp::new().unwrap();
        assert!(it.eval_str("(define x 1) (define x 2)").is_err());
    }

    #[test]
    fn test_function_define_replaces() {
        assert_eq!(eval_all("(define (f) 1) (define (f) 2) (f)"), vec!["F", "F", "2"]);
    }

    #[test]
    fn test_lambda_application() {
        assert_eq!(eval_one("((lambda (x y) (+ x y)) 3 4)"), "7");
    }

    #[test]
    fn test_rest_parameters() {
        assert_eq!(eval_one("((lambda args args) 1 2 3)"), "(1 2 3)");
        assert_eq!(eval_one("((lambda (a . rest) rest) 1 2 3)"), "(2 3)");
        assert_eq!(eval_one("((lambda (a b . r) (list a b r)) 1 2)"), "(1 2 ())");
    }

    #[test]
    fn test_too_few_args() {
        let mut it = Interp::new().unwrap();
        assert!(it.eval_str("((lambda (a b) a) 1)").is_err());
    }

    #[test]
    fn test_left_to_right_evaluation() {
        let out = eval_all(
            "(define trace '())
             (define (note x) (begin (set! trace (cons x trace)) x))
             (+ (note 1) (note 2) (note 3))
             (reverse trace)",
        );
        assert_eq!(out[2], "6");
        assert_eq!(out[3], "(1 2 3)");
    }

    #[test]
    fn test_nested_binding_shadows_global() {
        let out = eval_all(
            "(define x 1)
             (define (probe) x)
             ((lambda (x) (list x (probe))) 2)
             x",
        );
        assert_eq!(out[2], "(2 1)");
        assert_eq!(out[3], "1");
    }

    #[test]
    fn test_set_updates_nearest_binding() {
        let out = eval_all(
            "(define x 1)
             ((lambda (x) (begin (set! x 9) x)) 2)
             x",
        );
        assert_eq!(out[1], "9");
        assert_eq!(out[2], "1");
    }

    #[test]
    fn test_if_forms() {
        assert_eq!(eval_one("(if #t 1 2)"), "1");
        assert_eq!(eval_one("(if #f 1 2)"), "2");
        assert_eq!(eval_one("(if '() 1 2)"), "2");
        // Missing alternative returns the condition's (false) value.
        assert_eq!(eval_one("(if #f 1)"), "#F");
    }

    #[test]
    fn test_begin_or_and() {
        assert_eq!(eval_one("(begin 1 2 3)"), "3");
        assert_eq!(eval_one("(begin)"), "()");
        assert_eq!(eval_one("(or #f '() 7 9)"), "7");
        assert_eq!(eval_one("(or)"), "#F");
        assert_eq!(eval_one("(and 1 2 3)"), "3");
        assert_eq!(eval_one("(and 1 #f 3)"), "#F");
        assert_eq!(eval_one("(and)"), "#T");
    }

    #[test]
    fn test_tail_recursion_is_bounded() {
        let out = eval_all(
            "(define (loop n) (if (= n 0) 'done (loop (- n 1))))
             (loop 20000)",
        );
        assert_eq!(out[1], "DONE");
    }

    #[test]
    fn test_mutual_tail_recursion() {
        let out = eval_all(
            "(define (even-loop n) (if (= n 0) 'yes (odd-loop (- n 1))))
             (define (odd-loop n) (if (= n 0) 'no (even-loop (- n 1))))
             (even-loop 10001)",
        );
        assert_eq!(out[2], "NO");
    }

    #[test]
    fn test_call_cc_escape() {
        assert_eq!(eval_one("(call/cc (lambda (k) (+ 1 (k 42))))"), "42");
    }

    #[test]
    fn test_call_cc_no_escape() {
        assert_eq!(eval_one("(+ 1 (call/cc (lambda (k) 10)))"), "11");
    }

    #[test]
    fn test_continuation_reentry() {
        let out = eval_all(
            "(define c #f)
             (+ 1 (call/cc (lambda (k) (begin (set! c k) 10))))
             (c 100)",
        );
        assert_eq!(out[1], "11");
        assert_eq!(out[2], "101");
    }

    #[test]
    fn test_user_macro() {
        let out = eval_all(
            "(macro my-when (lambda (form) \
               (list 'if (car (cdr form)) (cons 'begin (cdr (cdr form))) #f)))
             (my-when #t 1 2 3)
             (my-when #f 1 2 3)",
        );
        assert_eq!(out[0], "MY-WHEN");
        assert_eq!(out[1], "3");
        assert_eq!(out[2], "#F");
    }

    #[test]
    fn test_macro_does_not_shadow_variable() {
        // A symbol can be both a macro and a variable; the macro only wins
        // in head position.
        let out = eval_all(
            "(define twice 5)
             (macro twice (lambda (form) (list '* 2 (car (cdr form)))))
             (twice 10)
             twice",
        );
        assert_eq!(out[2], "20");
        assert_eq!(out[3], "5");
    }

    #[test]
    fn test_expander_sees_unevaluated_form() {
        let out = eval_all(
            "(macro grab (lambda (form) (list 'quote form)))
             (grab (+ 1 2))",
        );
        assert_eq!(out[1], "(GRAB (+ 1 2))");
    }

    #[test]
    fn test_eval_primitive() {
        assert_eq!(eval_one("(eval '(+ 1 2))"), "3");
        assert_eq!(eval_one("(eval (list '+ 3 4))"), "7");
    }

    #[test]
    fn test_eval_with_environment() {
        let out = eval_all(
            "(define e (the-environment))
             (define x 5)
             (eval 'x e)",
        );
        assert_eq!(out[2], "5");
    }

    #[test]
    fn test_apply_primitive_and_closure() {
        assert_eq!(eval_one("(apply + '(1 2 3))"), "6");
        assert_eq!(eval_one("(apply (lambda (a b) (* a b)) '(6 7))"), "42");
    }

    #[test]
    fn test_torture_parity() {
        // Everything that works normally must work with a collection before
        // every allocation.
        let mut it = Interp::new().unwrap();
        it.heap.torture = true;
        let out = it
            .eval_str(
                "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
                 (fact 8)
                 (append '(1 2) '(3 4))
                 (call/cc (lambda (k) (+ 1 (k 41))))",
            )
            .unwrap();
        assert_eq!(out[1], "40320");
        assert_eq!(out[2], "(1 2 3 4)");
        assert_eq!(out[3], "41");
    }

    #[test]
    fn test_wrong_arity_to_primitive() {
        let mut it = Interp::new().unwrap();
        let err = it.eval_str("(car 1 2)").unwrap_err();
        assert!(matches!(err, SchemeError::WrongArity { .. }));
        // The machine recovers for the next expression.
        it.clear_stacks();
        assert_eq!(it.eval_str("(car '(9))").unwrap(), vec!["9"]);
    }
}
