//! The cell value model.
//!
//! Every runtime value is a `Cell`: one variant record living in the heap
//! arena, referenced by index. References between cells are direct
//! `CellRef`s; there is no indirection through handles. The GC never moves
//! cells, so a `CellRef` stays valid for the life of the cell.

/// Index of a cell in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef(pub(crate) u32);

impl CellRef {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the primitive registry (`ops::PRIMS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimId(pub(crate) u16);

/// Index into the symbol table; doubles as the global-environment slot.
pub type SymbolId = usize;

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    Input,
    Output,
    Closed,
}

/// Which suspended special form a `Resume` cell resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    Define,
    Set,
    If,
    Begin,
    Or,
    And,
    Macro,
    /// The macro expander itself: replace the pending pair with its expansion
    Expand,
    /// `load`: read and evaluate the next expression from the port
    Load,
}

/// One heap cell.
///
/// `Free` cells are threaded onto the allocator's free list. The sentinel
/// singletons (`Nil`, `True`, `False`, `Eof`) are allocated once at startup
/// and compared by `CellRef` identity, as are the stack-machine markers,
/// which are interned symbols (`*CALL*`, `*MARK*`, ...).
#[derive(Debug)]
pub enum Cell {
    Free { next: Option<CellRef> },
    Nil,
    True,
    False,
    Eof,
    Pair { car: CellRef, cdr: CellRef },
    Int(i64),
    Float(f64),
    Symbol(SymbolId),
    Char(char),
    Str(String),
    /// `slot` indexes the interpreter's port table
    Port { slot: usize, dir: PortDir },
    /// User procedure: captures the nested environment of its definition
    Closure { params: CellRef, body: CellRef, env: CellRef },
    /// User special form: no captured environment, unevaluated arguments
    UserForm { params: CellRef, body: CellRef },
    /// Reified machine state: the four stacks are snapshot lists
    Continuation { env: CellRef, exprs: CellRef, vals: CellRef, funcs: CellRef },
    /// Built-in procedure
    Primitive(PrimId),
    /// Built-in special form
    SpecialForm(PrimId),
    /// Compiled block: opcode bytes plus constant pool
    Bytecode { code: Vec<u8>, consts: Vec<CellRef> },
    /// Saved point inside a bytecode block
    ExecPoint { bytecode: CellRef, pc: usize, env: CellRef },
    Vector(Vec<CellRef>),
    /// Suspended special form on the expression stack
    Resume(ResumeKind),
    /// `nested` is an a-list of bindings; `global` is indexed by `SymbolId`,
    /// `None` meaning unbound (distinct from `()`)
    Environment { nested: CellRef, global: Vec<Option<CellRef>> },
}

impl Cell {
    /// Human-readable tag name, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Cell::Free { .. } => "free",
            Cell::Nil => "()",
            Cell::True => "#T",
            Cell::False => "#F",
            Cell::Eof => "#EOF",
            Cell::Pair { .. } => "pair",
            Cell::Int(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Symbol(_) => "symbol",
            Cell::Char(_) => "character",
            Cell::Str(_) => "string",
            Cell::Port { .. } => "port",
            Cell::Closure { .. } => "closure",
            Cell::UserForm { .. } => "form",
            Cell::Continuation { .. } => "continuation",
            Cell::Primitive(_) => "primitive procedure",
            Cell::SpecialForm(_) => "primitive form",
            Cell::Bytecode { .. } => "byte-code",
            Cell::ExecPoint { .. } => "execution point",
            Cell::Vector(_) => "vector",
            Cell::Resume(_) => "resume",
            Cell::Environment { .. } => "environment",
        }
    }
}
