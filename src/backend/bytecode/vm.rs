//! The bytecode interpreter.
//!
//! Fetch, increment, dispatch. Control instructions execute inline;
//! primitive opcodes dispatch through the same handlers the tree walker
//! uses. Anything that must go through the tree evaluator (a user call,
//! `eval`, `apply`, `call/cc`) first saves an execution point so control
//! returns to the middle of this block - unless the next instruction is
//! `Return`, in which case the call is in tail position and the block is
//! abandoned outright.

use tracing::trace;

use super::opcodes::Op;
use crate::backend::cell::{Cell, CellRef};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

impl Interp {
    fn bc_len(&self, bc: CellRef) -> usize {
        match self.cell(bc) {
            Cell::Bytecode { code, .. } => code.len(),
            _ => 0,
        }
    }

    fn bc_byte(&self, bc: CellRef, pc: usize) -> EvalResult<u8> {
        match self.cell(bc) {
            Cell::Bytecode { code, .. } => code
                .get(pc)
                .copied()
                .ok_or_else(|| SchemeError::Runtime("Byte-code pc out of range".to_string())),
            _ => Err(SchemeError::Runtime("Not byte-code".to_string())),
        }
    }

    fn bc_const(&self, bc: CellRef, k: u8) -> EvalResult<CellRef> {
        match self.cell(bc) {
            Cell::Bytecode { consts, .. } => consts
                .get(k as usize)
                .copied()
                .ok_or_else(|| SchemeError::Runtime("Bad constant reference".to_string())),
            _ => Err(SchemeError::Runtime("Not byte-code".to_string())),
        }
    }

    /// Run a `Bytecode` cell from the top, or resume an `ExecPoint` where
    /// it left off (restoring its environment).
    pub fn run_bytecode(&mut self, block: CellRef) -> EvalResult<()> {
        let (bc, mut pc) = match self.cell(block) {
            Cell::ExecPoint { bytecode, pc, env } => {
                let (b, p, e) = (*bytecode, *pc, *env);
                self.set_nested(e);
                (b, p)
            }
            Cell::Bytecode { .. } => (block, 0),
            _ => {
                return Err(SchemeError::Runtime(format!(
                    "Can't execute {}",
                    self.cell(block).kind_name()
                )))
            }
        };

        while pc < self.bc_len(bc) {
            let byte = self.bc_byte(bc, pc)?;
            pc += 1;
            let op = Op::try_from(byte)
                .map_err(|_| SchemeError::Runtime(format!("Illegal byte-code op: {}", byte)))?;
            trace!(target: "schemetron::eval", pc, op = ?op, "bytecode");

            match op {
                Op::NoOp => {}
                Op::CollectArgs => {
                    let lst = self.gather_vals()?;
                    self.vals.push(lst)?;
                }
                Op::PushConst => {
                    let k = self.bc_byte(bc, pc)?;
                    pc += 1;
                    let c = self.bc_const(bc, k)?;
                    self.vals.push(c)?;
                }
                Op::PushVar => {
                    let k = self.bc_byte(bc, pc)?;
                    pc += 1;
                    let sym = self.bc_const(bc, k)?;
                    let value = if let Some(binding) = self.acc_nested(sym) {
                        self.cdr(binding)
                    } else if let Some(value) = self.acc_global(sym) {
                        value
                    } else {
                        return Err(SchemeError::UndefinedSymbol(self.sym_name(sym).to_string()));
                    };
                    self.vals.push(value)?;
                }
                Op::Return => return Ok(()),
                Op::NilBranch => {
                    let v = self.vals.pop()?;
                    if self.is_false(v) {
                        pc = self.bc_byte(bc, pc)? as usize;
                    } else {
                        pc += 1;
                    }
                }
                Op::Branch => {
                    pc = self.bc_byte(bc, pc)? as usize;
                }
                Op::PopVal | Op::PushFunc => {
                    let v = self.vals.pop()?;
                    self.funcs.push(v)?;
                }
                Op::MakeClosure => {
                    let body = self.vals.pop()?;
                    let params = self.vals.pop()?;
                    let env = self.nested_env();
                    let close = self.closure(params, body, env);
                    self.vals.push(close)?;
                }
                Op::PushMark => self.vals.push(self.mark)?,
                Op::Call => {
                    // Hand the pending application to the tree evaluator;
                    // it will return here through the execution point.
                    self.save_exe(bc, pc)?;
                    self.exprs.push(self.call)?;
                    return Ok(());
                }
                other => {
                    let escapes = matches!(other, Op::Eval | Op::Apply | Op::CallCC);
                    if escapes {
                        self.save_exe(bc, pc)?;
                    }
                    let handler = self.bops[byte as usize].ok_or_else(|| {
                        SchemeError::Runtime(format!("Illegal byte-code op: {:?}", other))
                    })?;
                    handler(self)?;
                    if escapes {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// Save an execution point for the instruction at `pc` - unless it is
    /// `Return` (or the block end), in which case the pending call is a
    /// tail call and returns straight to this block's caller.
    fn save_exe(&mut self, bc: CellRef, pc: usize) -> EvalResult<()> {
        if pc < self.bc_len(bc) && self.bc_byte(bc, pc)? != Op::Return.to_byte() {
            let env = self.nested_env();
            let ep = self.exec_point(bc, pc, env);
            self.exprs.push(ep)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;

    /// Compile an expression, run it through the VM, return the written
    /// result. Exercises the tree walker + VM interplay end to end.
    fn run_compiled(it: &mut Interp, src: &str) -> String {
        let program = format!("(eval (*compile* '{}))", src);
        it.eval_str(&program).unwrap().pop().unwrap()
    }

    fn tree_walked(it: &mut Interp, src: &str) -> String {
        it.eval_str(src).unwrap().pop().unwrap()
    }

    #[test]
    fn test_compiled_constants() {
        let mut it = Interp::new().unwrap();
        assert_eq!(run_compiled(&mut it, "42"), "42");
        assert_eq!(run_compiled(&mut it, "\"s\""), "\"s\"");
    }

    #[test]
    fn test_compiled_primitives() {
        let mut it = Interp::new().unwrap();
        assert_eq!(run_compiled(&mut it, "(+ 1 2 3)"), "6");
        assert_eq!(run_compiled(&mut it, "(car '(a b))"), "A");
        assert_eq!(run_compiled(&mut it, "(cons 1 2)"), "(1 . 2)");
    }

    #[test]
    fn test_compiled_if_both_arms() {
        let mut it = Interp::new().unwrap();
        assert_eq!(run_compiled(&mut it, "(if (< 1 2) 'yes 'no)"), "YES");
        assert_eq!(run_compiled(&mut it, "(if (> 1 2) 'yes 'no)"), "NO");
    }

    #[test]
    fn test_compiled_lambda_roundtrip_call() {
        let mut it = Interp::new().unwrap();
        assert_eq!(run_compiled(&mut it, "((lambda (x y) (* x y)) 6 7)"), "42");
    }

    #[test]
    fn test_compiled_closure_called_from_tree_code() {
        let mut it = Interp::new().unwrap();
        it.eval_str("(define f (eval (*compile* '(lambda (n) (+ n 1)))))").unwrap();
        assert_eq!(tree_walked(&mut it, "(f 41)"), "42");
    }

    #[test]
    fn test_compiled_recursion_with_tail_call() {
        let mut it = Interp::new().unwrap();
        it.eval_str(
            "(define loop (eval (*compile* '(lambda (n) (if (= n 0) 'done (loop (- n 1)))))))",
        )
        .unwrap();
        assert_eq!(tree_walked(&mut it, "(loop 5000)"), "DONE");
    }

    #[test]
    fn test_compiled_define_binds_global() {
        let mut it = Interp::new().unwrap();
        assert_eq!(run_compiled(&mut it, "(define z 9)"), "Z");
        assert_eq!(tree_walked(&mut it, "z"), "9");
    }

    #[test]
    fn test_compiled_call_cc() {
        let mut it = Interp::new().unwrap();
        assert_eq!(run_compiled(&mut it, "(call/cc (lambda (k) (+ 1 (k 42))))"), "42");
    }

    #[test]
    fn test_tree_and_bytecode_agree() {
        let cases = [
            "(+ 1 2 3)",
            "(* 2 (- 10 3))",
            "(if (= 1 1) (+ 2 2) (+ 3 3))",
            "(begin 1 2 (+ 1 2))",
            "((lambda (a b) (cons a b)) 1 '(2))",
            "(length '(a b c))",
            "(append '(1) '(2 3))",
        ];
        for src in cases {
            let mut it1 = Interp::new().unwrap();
            let mut it2 = Interp::new().unwrap();
            let tree = tree_walked(&mut it1, src);
            let compiled = run_compiled(&mut it2, src);
            assert_eq!(tree, compiled, "tree/bytecode divergence on {}", src);
        }
    }

    #[test]
    fn test_torture_mode_compiled_code() {
        let mut it = Interp::new().unwrap();
        it.heap.torture = true;
        assert_eq!(run_compiled(&mut it, "((lambda (x) (+ x 1)) 41)"), "42");
    }
}
