//! Expression-to-bytecode compiler.
//!
//! Code is generated into a scratch buffer (code bytes plus constant refs)
//! and copied into a `Bytecode` cell when the expression is done. Branch
//! operands are single bytes holding absolute code offsets, so a block is
//! limited to 256 addressable bytes; the constant pool is capped at 256
//! entries for the same reason.
//!
//! Tail positions compile to `Return` instead of a join-point branch, which
//! together with the interpreter's execution-point rule gives compiled code
//! the same proper-tail-call property as the tree walker.
//!
//! The compiler protects what it builds: the expression is copied and the
//! copy registered before any code refers into it, and every inner lambda's
//! fresh bytecode cell is pushed on the register stack until the outer
//! block has been boxed.

use itertools::Itertools;
use smallvec::SmallVec;
use tracing::debug;

use super::opcodes::Op;
use crate::backend::cell::{Cell, CellRef};
use crate::backend::error::{CompileError, EvalResult, SchemeError};
use crate::backend::interp::Interp;
use crate::backend::ops::{self, PrimKind};

/// Capacity of a single code buffer.
pub const MAX_BCODE: usize = 512;
/// Capacity of a constant pool; operands are one byte.
pub const MAX_CONST: usize = 256;

pub(crate) struct CodeBuffer {
    code: SmallVec<[u8; 64]>,
    consts: SmallVec<[CellRef; 16]>,
}

impl CodeBuffer {
    fn new() -> Self {
        Self { code: SmallVec::new(), consts: SmallVec::new() }
    }

    fn emit(&mut self, op: Op) -> Result<(), CompileError> {
        self.emit_byte(op.to_byte())
    }

    fn emit_byte(&mut self, b: u8) -> Result<(), CompileError> {
        if self.code.len() >= MAX_BCODE {
            return Err(CompileError::CodeTooLarge);
        }
        self.code.push(b);
        Ok(())
    }

    /// Current code offset; the next emitted byte lands here.
    fn here(&self) -> usize {
        self.code.len()
    }

    /// Patch a one-byte operand at `at` to point at `target`.
    fn fixup(&mut self, at: usize, target: usize) -> Result<(), CompileError> {
        if target > u8::MAX as usize {
            return Err(CompileError::BranchOutOfRange);
        }
        self.code[at] = target as u8;
        Ok(())
    }

    /// Add a constant, returning its pool index.
    fn add_const(&mut self, k: CellRef) -> Result<u8, CompileError> {
        if self.consts.len() >= MAX_CONST {
            return Err(CompileError::TooManyConstants);
        }
        self.consts.push(k);
        Ok((self.consts.len() - 1) as u8)
    }
}

impl Interp {
    /// Fully compile expression `e` into a fresh `Bytecode` cell.
    pub fn compile_expr(&mut self, e: CellRef) -> EvalResult<CellRef> {
        let rm = self.reg_mark();
        self.reg_push(e);

        // Compile a copy so later mutation of the source (set-car! on a
        // quoted structure) cannot reach into the constant pool.
        let copy = self.tree_copy(e);
        self.reg_push(copy);

        let mut cb = CodeBuffer::new();
        self.compile_into(&mut cb, copy, true)?;
        let bc = self.make_bytecode(cb);

        if self.cp_debug {
            debug!(target: "schemetron::compile", "{}", self.disassemble(bc));
        }
        self.reg_release(rm);
        Ok(bc)
    }

    /// Box a finished buffer into a `Bytecode` cell. The caller must have
    /// every pool constant rooted.
    fn make_bytecode(&mut self, cb: CodeBuffer) -> CellRef {
        self.alloc(Cell::Bytecode { code: cb.code.to_vec(), consts: cb.consts.to_vec() })
    }

    /// Compile `e`; `at_end` is true when its value is the block's value.
    fn compile_into(&mut self, cb: &mut CodeBuffer, e: CellRef, at_end: bool) -> EvalResult<()> {
        if self.is_atom(e) {
            if self.is_symbol(e) {
                cb.emit(Op::PushVar)?;
                let k = cb.add_const(e)?;
                cb.emit_byte(k)?;
            } else {
                // Numbers, strings, chars, (), booleans, vectors, eof.
                cb.emit(Op::PushConst)?;
                let k = cb.add_const(e)?;
                cb.emit_byte(k)?;
            }
            return Ok(());
        }

        // A combination (f arg1 ...).
        let f = self.car(e);
        let args = self.cdr(e);

        // A symbol in head position may name a primitive or a system form.
        if self.is_symbol(f) {
            if let Some(binding) = self.acc_global(f) {
                match self.cell(binding) {
                    Cell::SpecialForm(pid) => {
                        let pid = *pid;
                        return self.compile_form(cb, pid, args, at_end);
                    }
                    Cell::Primitive(pid) => {
                        let pid = *pid;
                        return self.compile_prim(cb, pid, args);
                    }
                    _ => {}
                }
            }
        }

        // User closure (or form) application: mark, resolve the callable,
        // queue it, evaluate the arguments, call.
        cb.emit(Op::PushMark)?;
        self.compile_into(cb, f, false)?;
        cb.emit(Op::PushFunc)?;
        self.compile_args(cb, args)?;
        cb.emit(Op::Call)?;
        Ok(())
    }

    /// Arguments compile left to right; none of them is in tail position.
    fn compile_args(&mut self, cb: &mut CodeBuffer, mut args: CellRef) -> EvalResult<()> {
        while self.is_pair(args) {
            let arg = self.car(args);
            self.compile_into(cb, arg, false)?;
            args = self.cdr(args);
        }
        Ok(())
    }

    fn compile_prim(&mut self, cb: &mut CodeBuffer, pid: crate::backend::cell::PrimId, args: CellRef) -> EvalResult<()> {
        let def = ops::prim(pid);
        let nargs = self.list_len(args);
        ops::check_arity(def, nargs).map_err(|_| {
            SchemeError::Compile(CompileError::WrongArity { name: def.name.to_string(), got: nargs })
        })?;

        // Variadic primitives scan the value stack back to a mark.
        if def.is_variadic() {
            cb.emit(Op::PushMark)?;
        }
        self.compile_args(cb, args)?;
        cb.emit(def.code)?;
        Ok(())
    }

    fn compile_form(
        &mut self,
        cb: &mut CodeBuffer,
        pid: crate::backend::cell::PrimId,
        args: CellRef,
        at_end: bool,
    ) -> EvalResult<()> {
        let def = ops::prim(pid);
        debug_assert_eq!(def.kind, PrimKind::Form);
        match def.code {
            Op::Begin => self.compile_begin(cb, args, at_end),
            Op::If => self.compile_if(cb, args, at_end),
            Op::Quote => {
                cb.emit(Op::PushConst)?;
                let k = cb.add_const(self.car(args))?;
                cb.emit_byte(k)?;
                Ok(())
            }
            Op::Lambda => self.compile_lambda(cb, args),
            Op::Define => self.compile_binding_form(cb, args, Op::Define),
            Op::Set => self.compile_binding_form(cb, args, Op::Set),
            Op::Macro => Err(CompileError::MacroInCompiledCode.into()),
            _ => Err(CompileError::UnsupportedForm(def.name.to_string()).into()),
        }
    }

    /// `(begin e1 ... en)`: intermediate values are shunted off the value
    /// stack; only the last expression keeps the caller's tail flag.
    fn compile_begin(&mut self, cb: &mut CodeBuffer, mut e: CellRef, at_end: bool) -> EvalResult<()> {
        while self.is_pair(e) {
            let exp = self.car(e);
            e = self.cdr(e);
            if self.is_pair(e) {
                self.compile_into(cb, exp, false)?;
                cb.emit(Op::PopVal)?;
            } else {
                self.compile_into(cb, exp, at_end)?;
            }
        }
        Ok(())
    }

    /// `(if cond then [else])`. In tail position both branches end in
    /// `Return`; otherwise the then-branch jumps past the else-branch.
    fn compile_if(&mut self, cb: &mut CodeBuffer, e: CellRef, at_end: bool) -> EvalResult<()> {
        self.compile_into(cb, self.car(e), false)?;

        cb.emit(Op::NilBranch)?;
        let goto_else = cb.here();
        cb.emit(Op::NoOp)?;

        self.compile_into(cb, self.cadr(e), at_end)?;

        let goto_done = if at_end {
            cb.emit(Op::Return)?;
            None
        } else {
            cb.emit(Op::Branch)?;
            let at = cb.here();
            cb.emit(Op::NoOp)?;
            Some(at)
        };

        cb.fixup(goto_else, cb.here())?;
        // A missing alternative compiles to (), matching the source's
        // compiled semantics.
        self.compile_into(cb, self.caddr(e), at_end)?;

        if at_end {
            cb.emit(Op::Return)?;
        } else if let Some(at) = goto_done {
            cb.fixup(at, cb.here())?;
            cb.emit(Op::NoOp)?;
        }
        Ok(())
    }

    /// `(lambda params body...)`: the body gets its own block, compiled in
    /// tail position; the outer block pushes params and body and closes.
    fn compile_lambda(&mut self, cb: &mut CodeBuffer, e: CellRef) -> EvalResult<()> {
        let mut inner = CodeBuffer::new();
        let body = self.cdr(e);
        self.compile_begin(&mut inner, body, true)?;
        let body_code = self.make_bytecode(inner);
        // Keep the fresh block alive until the enclosing compile finishes;
        // the caller's register scope releases it.
        self.reg_push(body_code);

        cb.emit(Op::PushConst)?;
        let params = self.car(e);
        let k = cb.add_const(params)?;
        cb.emit_byte(k)?;

        cb.emit(Op::PushConst)?;
        let k = cb.add_const(body_code)?;
        cb.emit_byte(k)?;

        cb.emit(Op::MakeClosure)?;
        Ok(())
    }

    /// `(define sym expr)` / `(set! sym expr)`: push the symbol, evaluate
    /// the expression, then bind. The function-define shorthand is not
    /// compilable.
    fn compile_binding_form(&mut self, cb: &mut CodeBuffer, e: CellRef, op: Op) -> EvalResult<()> {
        let sym = self.car(e);
        if !self.is_symbol(sym) {
            return Err(CompileError::BindToNonSymbol(self.write_string(sym)).into());
        }
        cb.emit(Op::PushConst)?;
        let k = cb.add_const(sym)?;
        cb.emit_byte(k)?;

        self.compile_into(cb, self.cadr(e), false)?;
        cb.emit(op)?;
        Ok(())
    }

    /// Render a bytecode cell for `-c` dumps and tests.
    pub fn disassemble(&self, bc: CellRef) -> String {
        let (code, consts) = match self.cell(bc) {
            Cell::Bytecode { code, consts } => (code.clone(), consts.clone()),
            _ => return "#<not byte-code>".to_string(),
        };
        let mut out = format!("code size: {}, constants: {}\n", code.len(), consts.len());
        let mut pc = 0;
        while pc < code.len() {
            let byte = code[pc];
            match Op::try_from(byte) {
                Ok(op) => {
                    out.push_str(&format!("{:04} {:?}", pc, op));
                    pc += 1;
                    for _ in 0..op.immediate_size() {
                        out.push_str(&format!(" {}", code.get(pc).copied().unwrap_or(0)));
                        pc += 1;
                    }
                }
                Err(_) => {
                    out.push_str(&format!("{:04} ??? (0x{:02x})", pc, byte));
                    pc += 1;
                }
            }
            out.push('\n');
        }
        out.push_str("constants: ");
        out.push_str(&consts.iter().map(|&k| self.write_string(k)).join(", "));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cell::PortDir;
    use crate::backend::ports::PortState;

    fn compile_source(it: &mut Interp, src: &str) -> CellRef {
        let port = it.add_port(PortState::from_string(src), PortDir::Input);
        it.reg_push(port);
        let e = it.read(port).unwrap();
        it.reg_push(e);
        it.compile_expr(e).unwrap()
    }

    fn ops_of(it: &Interp, bc: CellRef) -> Vec<Op> {
        let code = match it.cell(bc) {
            Cell::Bytecode { code, .. } => code.clone(),
            _ => panic!("not bytecode"),
        };
        let mut out = Vec::new();
        let mut pc = 0;
        while pc < code.len() {
            let op = Op::try_from(code[pc]).unwrap();
            out.push(op);
            pc += 1 + op.immediate_size();
        }
        out
    }

    #[test]
    fn test_constant_compiles_to_push_const() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "42");
        assert_eq!(ops_of(&it, bc), vec![Op::PushConst]);
    }

    #[test]
    fn test_symbol_compiles_to_push_var() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "x");
        assert_eq!(ops_of(&it, bc), vec![Op::PushVar]);
    }

    #[test]
    fn test_fixed_arity_primitive_has_no_mark() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(car '(1))");
        assert_eq!(ops_of(&it, bc), vec![Op::PushConst, Op::Car]);
    }

    #[test]
    fn test_variadic_primitive_gets_mark() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(+ 1 2)");
        assert_eq!(
            ops_of(&it, bc),
            vec![Op::PushMark, Op::PushConst, Op::PushConst, Op::Add]
        );
    }

    #[test]
    fn test_user_call_shape() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(f 1)");
        assert_eq!(
            ops_of(&it, bc),
            vec![Op::PushMark, Op::PushVar, Op::PushFunc, Op::PushConst, Op::Call]
        );
    }

    #[test]
    fn test_tail_if_emits_returns() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(if x 1 2)");
        let ops = ops_of(&it, bc);
        assert_eq!(
            ops,
            vec![Op::PushVar, Op::NilBranch, Op::PushConst, Op::Return, Op::PushConst, Op::Return]
        );
    }

    #[test]
    fn test_non_tail_if_branches_to_join() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(begin (if x 1 2) 3)");
        let ops = ops_of(&it, bc);
        assert!(ops.contains(&Op::Branch));
        assert!(ops.contains(&Op::PopVal));
        assert!(!ops.contains(&Op::Return));
    }

    #[test]
    fn test_lambda_builds_inner_block() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(lambda (x) x)");
        assert_eq!(ops_of(&it, bc), vec![Op::PushConst, Op::PushConst, Op::MakeClosure]);
        // Second constant is the compiled body.
        if let Cell::Bytecode { consts, .. } = it.cell(bc) {
            assert!(matches!(it.cell(consts[1]), Cell::Bytecode { .. }));
        } else {
            panic!("expected bytecode");
        }
    }

    #[test]
    fn test_define_compiles_symbol_then_expr() {
        let mut it = Interp::new().unwrap();
        let bc = compile_source(&mut it, "(define y (+ 1 2))");
        let ops = ops_of(&it, bc);
        assert_eq!(ops[0], Op::PushConst);
        assert_eq!(*ops.last().unwrap(), Op::Define);
    }

    #[test]
    fn test_macro_refuses_to_compile() {
        let mut it = Interp::new().unwrap();
        let port = it.add_port(PortState::from_string("(macro m (lambda (f) f))"), PortDir::Input);
        it.reg_push(port);
        let e = it.read(port).unwrap();
        it.reg_push(e);
        let err = it.compile_expr(e).unwrap_err();
        assert_eq!(err, SchemeError::Compile(CompileError::MacroInCompiledCode));
    }

    #[test]
    fn test_primitive_arity_checked_at_compile_time() {
        let mut it = Interp::new().unwrap();
        let port = it.add_port(PortState::from_string("(car 1 2)"), PortDir::Input);
        it.reg_push(port);
        let e = it.read(port).unwrap();
        it.reg_push(e);
        assert!(matches!(
            it.compile_expr(e),
            Err(SchemeError::Compile(CompileError::WrongArity { .. }))
        ));
    }
}
