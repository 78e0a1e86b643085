//! Interpreter state: the heap, the four stacks, the environment, ports,
//! and the system sentinels.
//!
//! `Interp` is the single owner of all process-wide mutable state (spec:
//! one logical task, no concurrent operations). Everything reachable from
//! the register, expression, value, and function stacks plus the current
//! environment cell is a GC root.
//!
//! # Register discipline
//!
//! Any `CellRef` held in a Rust local across a call that can allocate must
//! be protected first. The protocol mirrors the classic register-stack
//! pattern:
//!
//! ```ignore
//! let rm = interp.reg_mark();          // ENTER
//! let slot = interp.reg_push(value);   // REG(x)
//! ...                                  // allocate freely
//! interp.reg_release(rm);              // LEAVE
//! ```
//!
//! The cell constructors (`cons`, `closure`, ...) protect their own
//! arguments, so plain construction never needs manual registration.

use tracing::trace;

use super::cell::{Cell, CellRef, PortDir, SymbolId};
use super::error::{EvalResult, SchemeError};
use super::heap::Heap;
use super::ops::{self, Handler};
use super::ports::{PortState, Stream};
use super::stacks::Stack;
use super::symbols::{SymbolTable, MAX_SYMBOLS};
use crate::scanner::Scanner;

/// Which machine stack a snapshot operation targets.
#[derive(Debug, Clone, Copy)]
pub enum StackSel {
    Expr,
    Val,
    Func,
}

pub struct Interp {
    pub heap: Heap,
    pub symbols: SymbolTable,

    pub exprs: Stack,
    pub vals: Stack,
    pub funcs: Stack,
    regs: Vec<CellRef>,
    saved_regs: usize,

    /// The current environment cell.
    pub env: CellRef,

    pub(crate) ports: Vec<Option<PortState>>,
    pub curr_in: CellRef,
    pub curr_out: CellRef,

    // Unique sentinel cells, compared by reference.
    pub nil: CellRef,
    pub t: CellRef,
    pub f: CellRef,
    pub eof: CellRef,
    pub stdin_port: CellRef,
    pub stdout_port: CellRef,
    pub call: CellRef,
    pub mark: CellRef,
    pub pushfunc: CellRef,
    pub restore: CellRef,
    pub exp_resume: CellRef,
    /// The symbol `*EXPANSION-TABLE*`
    pub exp_table: CellRef,

    /// Byte-code dispatch table: opcode byte -> primitive handler.
    pub(crate) bops: [Option<Handler>; 256],

    pub eval_debug: bool,
    pub cp_debug: bool,
    pub gc_debug: bool,

    pub(crate) scanner: Scanner,
    gensym_counter: u32,
}

impl Interp {
    pub fn new() -> EvalResult<Self> {
        let mut heap = Heap::new();
        let nil = match heap.take_free() {
            Some(r) => r,
            None => unreachable!("fresh heap has no free cells"),
        };
        heap.set(nil, Cell::Nil);

        let mut it = Self {
            heap,
            symbols: SymbolTable::new(),
            exprs: Stack::new("Expression"),
            vals: Stack::new("Value"),
            funcs: Stack::new("Function"),
            regs: Vec::new(),
            saved_regs: 0,
            env: nil,
            ports: Vec::new(),
            curr_in: nil,
            curr_out: nil,
            nil,
            t: nil,
            f: nil,
            eof: nil,
            stdin_port: nil,
            stdout_port: nil,
            call: nil,
            mark: nil,
            pushfunc: nil,
            restore: nil,
            exp_resume: nil,
            exp_table: nil,
            bops: [None; 256],
            eval_debug: false,
            cp_debug: false,
            gc_debug: false,
            scanner: Scanner::new(),
            gensym_counter: 0,
        };

        // System singletons, rooted on the register stack for the life of
        // the process.
        it.reg_push(nil);
        it.t = it.alloc(Cell::True);
        it.reg_push(it.t);
        it.f = it.alloc(Cell::False);
        it.reg_push(it.f);
        it.eof = it.alloc(Cell::Eof);
        it.reg_push(it.eof);

        it.call = it.def_const("*CALL*")?;
        it.mark = it.def_const("*MARK*")?;
        it.pushfunc = it.def_const("*PUSHFUNC*")?;
        it.restore = it.def_const("*RESTORE*")?;
        it.exp_table = it.def_const("*EXPANSION-TABLE*")?;
        it.exp_resume = it.alloc(Cell::Resume(super::cell::ResumeKind::Expand));
        it.reg_push(it.exp_resume);

        it.stdin_port = it.add_port(PortState::new(Stream::Stdin), PortDir::Input);
        it.reg_push(it.stdin_port);
        it.stdout_port = it.add_port(PortState::new(Stream::Stdout), PortDir::Output);
        it.reg_push(it.stdout_port);
        it.curr_in = it.stdin_port;
        it.curr_out = it.stdout_port;

        // The top-level environment: empty nested a-list, one global slot
        // per possible symbol.
        it.env = it.alloc(Cell::Environment { nested: nil, global: vec![None; MAX_SYMBOLS] });

        ops::install(&mut it)?;
        it.def_global(it.exp_table, it.nil)?;

        // Everything below this register mark survives a top-level reset.
        it.saved_regs = it.regs.len();
        Ok(it)
    }

    fn def_const(&mut self, name: &str) -> EvalResult<CellRef> {
        let sym = self.symbol(name)?;
        self.reg_push(sym);
        Ok(sym)
    }

    // === Register stack ===

    #[inline]
    pub fn reg_mark(&self) -> usize {
        self.regs.len()
    }

    #[inline]
    pub fn reg_push(&mut self, r: CellRef) -> usize {
        self.regs.push(r);
        self.regs.len() - 1
    }

    #[inline]
    pub fn set_reg(&mut self, slot: usize, r: CellRef) {
        self.regs[slot] = r;
    }

    #[inline]
    pub fn reg(&self, slot: usize) -> CellRef {
        self.regs[slot]
    }

    #[inline]
    pub fn reg_release(&mut self, mark: usize) {
        self.regs.truncate(mark);
    }

    // === Allocation and collection ===

    /// Allocate a cell. Collects when the free list is empty (always, in
    /// torture mode); grows the arena only when collection recovers nothing.
    pub fn alloc(&mut self, cell: Cell) -> CellRef {
        if self.heap.torture || self.heap.free_is_empty() {
            self.gc();
            if self.heap.free_is_empty() {
                self.heap.add_segment();
            }
        }
        let r = match self.heap.take_free() {
            Some(r) => r,
            None => unreachable!("free list empty after segment growth"),
        };
        self.heap.set(r, cell);
        r
    }

    /// Mark-and-sweep over the root set: the four stacks plus the current
    /// environment.
    pub fn gc(&mut self) {
        for i in 0..self.regs.len() {
            let r = self.regs[i];
            self.heap.mark(r);
        }
        for i in 0..self.exprs.len() {
            let r = self.exprs.get(i);
            self.heap.mark(r);
        }
        for i in 0..self.vals.len() {
            let r = self.vals.get(i);
            self.heap.mark(r);
        }
        for i in 0..self.funcs.len() {
            let r = self.funcs.get(i);
            self.heap.mark(r);
        }
        self.heap.mark(self.env);
        let stats = self.heap.sweep();
        if self.gc_debug {
            tracing::info!(
                target: "schemetron::gc",
                used = stats.used,
                recovered = stats.recovered,
                free = self.heap.count_free(),
                "collection"
            );
        }
        for slot in stats.freed_ports {
            self.ports[slot] = None;
        }
    }

    /// Reset for a fresh top-level prompt: clear the machine stacks, drop
    /// temporaries down to the system sentinels, restore default ports.
    pub fn clear_stacks(&mut self) {
        self.exprs.clear();
        self.vals.clear();
        self.funcs.clear();
        self.regs.truncate(self.saved_regs);
        self.curr_in = self.stdin_port;
        self.curr_out = self.stdout_port;
        self.scanner.reset();
    }

    // === Cell constructors (each protects its own arguments) ===

    pub fn cons(&mut self, car: CellRef, cdr: CellRef) -> CellRef {
        let rm = self.reg_mark();
        self.reg_push(car);
        self.reg_push(cdr);
        let r = self.alloc(Cell::Pair { car, cdr });
        self.reg_release(rm);
        r
    }

    pub fn int(&mut self, i: i64) -> CellRef {
        self.alloc(Cell::Int(i))
    }

    pub fn float(&mut self, x: f64) -> CellRef {
        self.alloc(Cell::Float(x))
    }

    pub fn char_cell(&mut self, c: char) -> CellRef {
        self.alloc(Cell::Char(c))
    }

    pub fn string(&mut self, s: String) -> CellRef {
        self.alloc(Cell::Str(s))
    }

    pub fn symbol(&mut self, name: &str) -> EvalResult<CellRef> {
        let id = self.symbols.intern(name)?;
        Ok(self.alloc(Cell::Symbol(id)))
    }

    pub fn closure(&mut self, params: CellRef, body: CellRef, env: CellRef) -> CellRef {
        let rm = self.reg_mark();
        self.reg_push(params);
        self.reg_push(body);
        self.reg_push(env);
        let r = self.alloc(Cell::Closure { params, body, env });
        self.reg_release(rm);
        r
    }

    pub fn user_form(&mut self, params: CellRef, body: CellRef) -> CellRef {
        let rm = self.reg_mark();
        self.reg_push(params);
        self.reg_push(body);
        let r = self.alloc(Cell::UserForm { params, body });
        self.reg_release(rm);
        r
    }

    pub fn exec_point(&mut self, bytecode: CellRef, pc: usize, env: CellRef) -> CellRef {
        let rm = self.reg_mark();
        self.reg_push(bytecode);
        self.reg_push(env);
        let r = self.alloc(Cell::ExecPoint { bytecode, pc, env });
        self.reg_release(rm);
        r
    }

    // === Cell accessors ===

    #[inline]
    pub fn cell(&self, r: CellRef) -> &Cell {
        self.heap.get(r)
    }

    /// Tolerant car: `()` for non-pairs.
    #[inline]
    pub fn car(&self, r: CellRef) -> CellRef {
        match self.heap.get(r) {
            Cell::Pair { car, .. } => *car,
            _ => self.nil,
        }
    }

    /// Tolerant cdr: `()` for non-pairs.
    #[inline]
    pub fn cdr(&self, r: CellRef) -> CellRef {
        match self.heap.get(r) {
            Cell::Pair { cdr, .. } => *cdr,
            _ => self.nil,
        }
    }

    pub fn cadr(&self, r: CellRef) -> CellRef {
        self.car(self.cdr(r))
    }

    pub fn caddr(&self, r: CellRef) -> CellRef {
        self.car(self.cdr(self.cdr(r)))
    }

    #[inline]
    pub fn is_nil(&self, r: CellRef) -> bool {
        r == self.nil
    }

    #[inline]
    pub fn is_pair(&self, r: CellRef) -> bool {
        matches!(self.heap.get(r), Cell::Pair { .. })
    }

    #[inline]
    pub fn is_atom(&self, r: CellRef) -> bool {
        !self.is_pair(r)
    }

    #[inline]
    pub fn is_symbol(&self, r: CellRef) -> bool {
        matches!(self.heap.get(r), Cell::Symbol(_))
    }

    #[inline]
    pub fn is_string(&self, r: CellRef) -> bool {
        matches!(self.heap.get(r), Cell::Str(_))
    }

    #[inline]
    pub fn is_number(&self, r: CellRef) -> bool {
        matches!(self.heap.get(r), Cell::Int(_) | Cell::Float(_))
    }

    /// `#F` and `()` are the false values.
    #[inline]
    pub fn is_false(&self, r: CellRef) -> bool {
        r == self.f || r == self.nil
    }

    pub fn boolean(&self, b: bool) -> CellRef {
        if b {
            self.t
        } else {
            self.f
        }
    }

    pub fn sym_id(&self, r: CellRef) -> Option<SymbolId> {
        match self.heap.get(r) {
            Cell::Symbol(id) => Some(*id),
            _ => None,
        }
    }

    pub fn sym_name(&self, r: CellRef) -> &str {
        match self.heap.get(r) {
            Cell::Symbol(id) => self.symbols.name(*id),
            _ => "",
        }
    }

    /// Top-level length of a list (improper tails are not counted).
    pub fn list_len(&self, mut r: CellRef) -> usize {
        let mut n = 0;
        while let Cell::Pair { cdr, .. } = self.heap.get(r) {
            n += 1;
            r = *cdr;
        }
        n
    }

    // === Equality ===

    /// Same cell, or the same symbol.
    pub fn eq_cells(&self, a: CellRef, b: CellRef) -> bool {
        if a == b {
            return true;
        }
        matches!(
            (self.heap.get(a), self.heap.get(b)),
            (Cell::Symbol(x), Cell::Symbol(y)) if x == y
        )
    }

    pub fn eqv_cells(&self, a: CellRef, b: CellRef) -> bool {
        if self.eq_cells(a, b) {
            return true;
        }
        match (self.heap.get(a), self.heap.get(b)) {
            (Cell::Int(x), Cell::Int(y)) => x == y,
            (Cell::Float(x), Cell::Float(y)) => x == y,
            (Cell::Char(x), Cell::Char(y)) => x == y,
            (Cell::Str(x), Cell::Str(y)) => x.is_empty() && y.is_empty(),
            _ => false,
        }
    }

    pub fn equal_cells(&self, a: CellRef, b: CellRef) -> bool {
        match (self.heap.get(a), self.heap.get(b)) {
            (Cell::Str(x), Cell::Str(y)) => x == y,
            (Cell::Vector(x), Cell::Vector(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(&ex, &ey)| self.equal_cells(ex, ey))
            }
            (Cell::Pair { .. }, Cell::Pair { .. }) => {
                self.equal_cells(self.car(a), self.car(b))
                    && self.equal_cells(self.cdr(a), self.cdr(b))
            }
            _ => self.eqv_cells(a, b),
        }
    }

    // === Environment access ===

    pub fn nested_env(&self) -> CellRef {
        match self.heap.get(self.env) {
            Cell::Environment { nested, .. } => *nested,
            _ => unreachable!("current environment is not an environment cell"),
        }
    }

    pub fn set_nested(&mut self, nested: CellRef) {
        match self.heap.get_mut(self.env) {
            Cell::Environment { nested: n, .. } => *n = nested,
            _ => unreachable!("current environment is not an environment cell"),
        }
    }

    /// Bind `sym` globally in the current environment.
    pub fn def_global(&mut self, sym: CellRef, val: CellRef) -> EvalResult<()> {
        let id = self.sym_id(sym).ok_or_else(|| {
            SchemeError::Runtime(format!(
                "Can't bind to non-symbol: {}",
                self.cell(sym).kind_name()
            ))
        })?;
        match self.heap.get_mut(self.env) {
            Cell::Environment { global, .. } => {
                global[id] = Some(val);
                Ok(())
            }
            _ => unreachable!("current environment is not an environment cell"),
        }
    }

    /// Nested binding pair `(sym . val)` for `sym`, innermost first.
    pub fn acc_nested(&self, sym: CellRef) -> Option<CellRef> {
        let id = self.sym_id(sym)?;
        self.assq_id(id, self.nested_env())
    }

    /// Search an a-list for a binding of the symbol with index `id`.
    pub fn assq_id(&self, id: SymbolId, mut alist: CellRef) -> Option<CellRef> {
        while let Cell::Pair { car: binding, cdr: rest } = self.heap.get(alist) {
            if self.sym_id(self.car(*binding)) == Some(id) {
                return Some(*binding);
            }
            alist = *rest;
        }
        None
    }

    /// Global binding of `sym`, or `None` when unbound.
    pub fn acc_global(&self, sym: CellRef) -> Option<CellRef> {
        let id = self.sym_id(sym)?;
        match self.heap.get(self.env) {
            Cell::Environment { global, .. } => global[id],
            _ => unreachable!("current environment is not an environment cell"),
        }
    }

    // === Stack snapshots (continuations) ===

    fn stack(&self, sel: StackSel) -> &Stack {
        match sel {
            StackSel::Expr => &self.exprs,
            StackSel::Val => &self.vals,
            StackSel::Func => &self.funcs,
        }
    }

    fn stack_mut(&mut self, sel: StackSel) -> &mut Stack {
        match sel {
            StackSel::Expr => &mut self.exprs,
            StackSel::Val => &mut self.vals,
            StackSel::Func => &mut self.funcs,
        }
    }

    /// Snapshot a stack as a proper list, bottom to top.
    pub fn capture_stack(&mut self, sel: StackSel) -> CellRef {
        let rm = self.reg_mark();
        let cap = self.reg_push(self.nil);
        for i in (0..self.stack(sel).len()).rev() {
            let item = self.stack(sel).get(i);
            let lst = self.cons(item, self.reg(cap));
            self.set_reg(cap, lst);
        }
        let lst = self.reg(cap);
        self.reg_release(rm);
        lst
    }

    /// Replace a stack's contents from a bottom-to-top snapshot list.
    pub fn restore_stack(&mut self, sel: StackSel, mut snapshot: CellRef) -> EvalResult<()> {
        self.stack_mut(sel).clear();
        while self.is_pair(snapshot) {
            let item = self.car(snapshot);
            self.stack_mut(sel).push(item)?;
            snapshot = self.cdr(snapshot);
        }
        Ok(())
    }

    // === Ports ===

    pub fn add_port(&mut self, state: PortState, dir: PortDir) -> CellRef {
        let slot = match self.ports.iter().position(|p| p.is_none()) {
            Some(free) => {
                self.ports[free] = Some(state);
                free
            }
            None => {
                self.ports.push(Some(state));
                self.ports.len() - 1
            }
        };
        self.alloc(Cell::Port { slot, dir })
    }

    pub fn port_info(&self, r: CellRef) -> Option<(usize, PortDir)> {
        match self.heap.get(r) {
            Cell::Port { slot, dir } => Some((*slot, *dir)),
            _ => None,
        }
    }

    pub fn port_state(&mut self, slot: usize) -> EvalResult<&mut PortState> {
        self.ports
            .get_mut(slot)
            .and_then(|p| p.as_mut())
            .ok_or_else(|| SchemeError::Runtime("Port is closed".to_string()))
    }

    /// Close a port cell: drop the stream, flip the direction tag.
    pub fn close_port(&mut self, r: CellRef) {
        if let Some((slot, dir)) = self.port_info(r) {
            if dir != PortDir::Closed {
                self.ports[slot] = None;
                if let Cell::Port { dir, .. } = self.heap.get_mut(r) {
                    *dir = PortDir::Closed;
                }
            }
        }
    }

    /// Write text through a port cell.
    pub fn port_write(&mut self, port: CellRef, text: &str) -> EvalResult<()> {
        let (slot, dir) = self
            .port_info(port)
            .ok_or_else(|| SchemeError::Runtime("Not a port".to_string()))?;
        if dir != PortDir::Output {
            return Err(SchemeError::Runtime("Port must be an output port".to_string()));
        }
        self.port_state(slot)?.write_str(text)
    }

    // === Misc ===

    /// A symbol guaranteed not to be interned yet.
    pub fn gensym(&mut self) -> EvalResult<CellRef> {
        loop {
            let name = format!("G{}", self.gensym_counter);
            self.gensym_counter += 1;
            if !self.symbols.contains(&name) {
                return self.symbol(&name);
            }
        }
    }

    /// Top five entries of each machine stack, for error reports.
    pub fn stack_dump(&self) -> String {
        let mut out = String::new();
        for (label, stack) in
            [("Expression", &self.exprs), ("Value", &self.vals), ("Function", &self.funcs)]
        {
            out.push_str(label);
            out.push_str(" stack: ");
            if stack.is_empty() {
                out.push_str("  <EMPTY>\n");
            } else {
                let len = stack.len();
                for i in (len.saturating_sub(5)..len).rev() {
                    out.push_str(&self.write_string(stack.get(i)));
                    out.push_str(" | ");
                }
                out.push('\n');
            }
        }
        out
    }

    pub(crate) fn trace_stacks(&self, where_: &str) {
        if self.eval_debug {
            trace!(target: "schemetron::eval", "{}\n{}", where_, self.stack_dump());
        }
    }
}
