//! The primitive registry.
//!
//! Every built-in procedure and special form is one row: name, opcode,
//! arity, and handler. Installation interns the name, binds a `Primitive`
//! or `SpecialForm` cell in the global environment, and wires the opcode
//! into the bytecode dispatch table (procedures dispatch to their own
//! handler; compilable forms to their bytecode variant).
//!
//! Arity encoding: `allowed == required` is exact; `allowed > required`
//! means between the two; `allowed < required` (written -1) means at least
//! `required`.

pub mod control;
pub mod forms;
pub mod io;
pub mod lists;
pub mod math;
pub mod preds;
pub mod strings;
pub mod vectors;

use super::bytecode::Op;
use super::cell::{Cell, PrimId};
use super::dump;
use super::error::{EvalResult, SchemeError};
use super::interp::Interp;

pub type Handler = fn(&mut Interp) -> EvalResult<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Proc,
    Form,
}

pub struct PrimDef {
    pub name: &'static str,
    pub code: Op,
    pub required: i8,
    pub allowed: i8,
    pub kind: PrimKind,
    pub handler: Handler,
    /// Bytecode-side handler for forms whose opcode can be emitted.
    pub bc_handler: Option<Handler>,
}

impl PrimDef {
    /// Variadic primitives get a mark under their argument group.
    pub fn is_variadic(&self) -> bool {
        self.required != self.allowed
    }
}

const fn proc(name: &'static str, code: Op, ra: i8, aa: i8, handler: Handler) -> PrimDef {
    PrimDef { name, code, required: ra, allowed: aa, kind: PrimKind::Proc, handler, bc_handler: None }
}

const fn form(
    name: &'static str,
    code: Op,
    ra: i8,
    aa: i8,
    handler: Handler,
    bc_handler: Option<Handler>,
) -> PrimDef {
    PrimDef { name, code, required: ra, allowed: aa, kind: PrimKind::Form, handler, bc_handler }
}

pub static PRIMS: &[PrimDef] = &[
    // Interpreter directives
    proc("THE-ENVIRONMENT", Op::TheEnvironment, 0, 0, control::op_the_environment),
    proc("TORTURE", Op::Torture, 0, 0, control::op_torture),
    proc("GCDEBUG", Op::GcDebug, 0, 0, control::op_gc_debug),
    proc("EVDEBUG", Op::EvDebug, 0, 0, control::op_ev_debug),
    proc("QUIT", Op::Exit, 0, 0, control::op_exit),
    proc("EXIT", Op::Exit, 0, 0, control::op_exit),
    proc("BYE", Op::Exit, 0, 0, control::op_exit),
    // Primitive list operations
    proc("CAR", Op::Car, 1, 1, lists::op_car),
    proc("CDR", Op::Cdr, 1, 1, lists::op_cdr),
    proc("CONS", Op::Cons, 2, 2, lists::op_cons),
    proc("SET-CAR!", Op::SetCar, 2, 2, lists::op_set_car),
    proc("SET-CDR!", Op::SetCdr, 2, 2, lists::op_set_cdr),
    // Predicates
    proc("NULL?", Op::IsNull, 1, 1, preds::op_is_null),
    proc("ATOM?", Op::IsAtom, 1, 1, preds::op_is_atom),
    proc("PAIR?", Op::IsPair, 1, 1, preds::op_is_pair),
    proc("SYMBOL?", Op::IsSymbol, 1, 1, preds::op_is_symbol),
    proc("NUMBER?", Op::IsNumber, 1, 1, preds::op_is_number),
    proc("INTEGER?", Op::IsInteger, 1, 1, preds::op_is_integer),
    proc("FLOAT?", Op::IsFloat, 1, 1, preds::op_is_float),
    proc("ZERO?", Op::IsZero, 1, 1, preds::op_is_zero),
    proc("BOOLEAN?", Op::IsBoolean, 1, 1, preds::op_is_boolean),
    proc("PROCEDURE?", Op::IsProcedure, 1, 1, preds::op_is_procedure),
    proc("CHAR?", Op::IsChar, 1, 1, preds::op_is_char),
    proc("STRING?", Op::IsString, 1, 1, preds::op_is_string),
    proc("VECTOR?", Op::IsVector, 1, 1, preds::op_is_vector),
    proc("EOF-OBJECT?", Op::IsEofObject, 1, 1, preds::op_is_eof_object),
    proc("INPUT-PORT?", Op::IsInputPort, 1, 1, preds::op_is_input_port),
    proc("OUTPUT-PORT?", Op::IsOutputPort, 1, 1, preds::op_is_output_port),
    // Equality
    proc("EQ?", Op::Eq, 2, 2, preds::op_eq),
    proc("EQV?", Op::Eqv, 2, 2, preds::op_eqv),
    proc("EQUAL?", Op::Equal, 2, 2, preds::op_equal),
    proc("NOT", Op::Not, 1, 1, preds::op_not),
    // Math
    proc("+", Op::Add, 0, -1, math::op_add),
    proc("-", Op::Sub, 0, -1, math::op_sub),
    proc("*", Op::Mul, 0, -1, math::op_mul),
    proc("/", Op::Div, 0, -1, math::op_div),
    proc("ABS", Op::Abs, 1, 1, math::op_abs),
    proc("<", Op::Lt, 2, 2, math::op_lt),
    proc(">", Op::Gt, 2, 2, math::op_gt),
    proc("<=", Op::Le, 2, 2, math::op_le),
    proc(">=", Op::Ge, 2, 2, math::op_ge),
    proc("=", Op::NumEq, 2, 2, math::op_num_eq),
    proc("<>", Op::NumNe, 2, 2, math::op_num_ne),
    proc("POSITIVE?", Op::IsPositive, 1, 1, math::op_positive),
    proc("NEGATIVE?", Op::IsNegative, 1, 1, math::op_negative),
    proc("ODD?", Op::IsOdd, 1, 1, math::op_odd),
    proc("EVEN?", Op::IsEven, 1, 1, math::op_even),
    proc("MAX", Op::Max, 1, -1, math::op_max),
    proc("MIN", Op::Min, 1, -1, math::op_min),
    // Special forms
    form("LAMBDA", Op::Lambda, 2, -1, forms::op_lambda, None),
    form("DEFINE", Op::Define, 2, -1, forms::op_define, Some(forms::bc_define)),
    form("SET!", Op::Set, 2, 2, forms::op_set, Some(forms::bc_set)),
    form("IF", Op::If, 2, 3, forms::op_if, None),
    form("QUOTE", Op::Quote, 1, 1, forms::op_quote, None),
    form("BEGIN", Op::Begin, 0, -1, forms::op_begin, None),
    form("OR", Op::Or, 0, -1, forms::op_or, None),
    form("AND", Op::And, 0, -1, forms::op_and, None),
    form("MACRO", Op::Macro, 2, 2, forms::op_macro, None),
    // Higher-level list operations
    proc("ASSOC", Op::Assoc, 2, 2, lists::op_assoc),
    proc("ASSQ", Op::Assq, 2, 2, lists::op_assq),
    proc("ASSV", Op::Assv, 2, 2, lists::op_assv),
    proc("MEMBER", Op::Member, 2, 2, lists::op_member),
    proc("MEMQ", Op::Memq, 2, 2, lists::op_memq),
    proc("MEMV", Op::Memv, 2, 2, lists::op_memv),
    proc("LIST", Op::List, 1, -1, lists::op_list),
    proc("LENGTH", Op::Length, 1, 1, lists::op_length),
    proc("APPEND", Op::Append, 2, -1, lists::op_append),
    proc("REVERSE", Op::Reverse, 1, 1, lists::op_reverse),
    proc("TREE-COPY", Op::TreeCopy, 1, 1, lists::op_tree_copy),
    // Control
    proc("EVAL", Op::Eval, 1, 2, control::op_eval),
    proc("APPLY", Op::Apply, 2, 2, control::op_apply),
    proc("CALL/CC", Op::CallCC, 1, 1, control::op_call_cc),
    proc("CALL-WITH-CURRENT-CONTINUATION", Op::CallCC, 1, 1, control::op_call_cc),
    proc("*COMPILE*", Op::Compile, 1, 1, control::op_compile),
    // Environment persistence
    proc("DUMP-ENVIRONMENT", Op::DumpEnv, 1, 1, dump::op_dump_env),
    proc("RESTORE-ENVIRONMENT", Op::RestoreEnv, 1, 1, dump::op_restore_env),
    // Characters
    proc("CHAR=?", Op::CharEq, 2, 2, strings::op_char_eq),
    proc("CHAR<?", Op::CharLt, 2, 2, strings::op_char_lt),
    proc("CHAR>?", Op::CharGt, 2, 2, strings::op_char_gt),
    proc("CHAR<=?", Op::CharLe, 2, 2, strings::op_char_le),
    proc("CHAR>=?", Op::CharGe, 2, 2, strings::op_char_ge),
    proc("CHAR->INTEGER", Op::CharToInt, 1, 1, strings::op_char_to_int),
    proc("INTEGER->CHAR", Op::IntToChar, 1, 1, strings::op_int_to_char),
    // Strings
    proc("STRING-LENGTH", Op::StrLen, 1, 1, strings::op_str_len),
    proc("STRING-REF", Op::StrRef, 2, 2, strings::op_str_ref),
    proc("STRING=?", Op::StrEq, 2, 2, strings::op_str_eq),
    proc("STRING<?", Op::StrLt, 2, 2, strings::op_str_lt),
    proc("STRING>?", Op::StrGt, 2, 2, strings::op_str_gt),
    proc("STRING<=?", Op::StrLe, 2, 2, strings::op_str_le),
    proc("STRING>=?", Op::StrGe, 2, 2, strings::op_str_ge),
    proc("SUBSTRING", Op::Substring, 3, 3, strings::op_substring),
    proc("STRING->LIST", Op::StrToList, 1, 1, strings::op_str_to_list),
    proc("LIST->STRING", Op::ListToStr, 1, 1, strings::op_list_to_str),
    proc("SYMBOL->STRING", Op::SymToStr, 1, 1, strings::op_sym_to_str),
    proc("STRING->SYMBOL", Op::StrToSym, 1, 1, strings::op_str_to_sym),
    proc("STRING-APPEND", Op::StrAppend, 2, 2, strings::op_str_append),
    // Vectors
    proc("VECTOR", Op::VectorOf, 0, -1, vectors::op_vector_of),
    proc("MAKE-VECTOR", Op::MakeVector, 2, 2, vectors::op_make_vector),
    proc("VECTOR-LENGTH", Op::VectorLength, 1, 1, vectors::op_vector_length),
    proc("VECTOR-REF", Op::VectorRef, 2, 2, vectors::op_vector_ref),
    proc("VECTOR-SET!", Op::VectorSet, 3, 3, vectors::op_vector_set),
    proc("VECTOR-COPY", Op::VectorCopy, 1, 1, vectors::op_vector_copy),
    proc("VECTOR-FILL!", Op::VectorFill, 2, 2, vectors::op_vector_fill),
    proc("VECTOR->LIST", Op::VectorToList, 1, 1, vectors::op_vector_to_list),
    proc("LIST->VECTOR", Op::ListToVector, 1, 1, vectors::op_list_to_vector),
    // I/O
    proc("READ", Op::Read, 0, 1, io::op_read),
    proc("WRITE", Op::Write, 1, 2, io::op_write),
    proc("DISPLAY", Op::Display, 1, 2, io::op_display),
    proc("NEWLINE", Op::Newline, 0, 1, io::op_newline),
    proc("READ-CHAR", Op::ReadChar, 0, 1, io::op_read_char),
    proc("WRITE-CHAR", Op::WriteChar, 1, 2, io::op_write_char),
    proc("OPEN-INPUT-FILE", Op::OpenInFile, 1, 1, io::op_open_in_file),
    proc("OPEN-OUTPUT-FILE", Op::OpenOutFile, 1, 1, io::op_open_out_file),
    proc("CLOSE-FILE", Op::CloseFile, 1, 1, io::op_close_file),
    proc("CURRENT-INPUT-PORT", Op::CurrIn, 0, 0, io::op_curr_in),
    proc("CURRENT-OUTPUT-PORT", Op::CurrOut, 0, 0, io::op_curr_out),
    proc("LOAD", Op::Load, 1, 1, io::op_load),
    // Diagnostics
    proc("ERROR", Op::ErrorOp, 0, -1, control::op_error),
    proc("GENSYM", Op::Gensym, 0, 0, control::op_gensym),
    proc("CHDIR", Op::Chdir, 1, 1, control::op_chdir),
];

/// Look up a primitive's definition.
#[inline]
pub fn prim(pid: PrimId) -> &'static PrimDef {
    &PRIMS[pid.0 as usize]
}

/// Check an argument count against a primitive's arity encoding.
pub fn check_arity(def: &PrimDef, n: usize) -> EvalResult<()> {
    let ra = def.required as usize;
    let ok = if def.allowed == def.required {
        n == ra
    } else if def.allowed < def.required {
        n >= ra
    } else {
        n >= ra && n <= def.allowed as usize
    };
    if ok {
        Ok(())
    } else {
        Err(SchemeError::WrongArity { name: def.name.to_string(), got: n })
    }
}

/// Bind every primitive in the global environment and wire the bytecode
/// dispatch table.
pub fn install(it: &mut Interp) -> EvalResult<()> {
    for (i, def) in PRIMS.iter().enumerate() {
        let rm = it.reg_mark();
        let sym = it.symbol(def.name)?;
        it.reg_push(sym);
        let cell = match def.kind {
            PrimKind::Proc => Cell::Primitive(PrimId(i as u16)),
            PrimKind::Form => Cell::SpecialForm(PrimId(i as u16)),
        };
        let prim = it.alloc(cell);
        it.def_global(sym, prim)?;

        let byte = def.code.to_byte() as usize;
        it.bops[byte] = match def.kind {
            PrimKind::Proc => Some(def.handler),
            PrimKind::Form => def.bc_handler,
        };
        it.reg_release(rm);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_primitive_is_bound() {
        let mut it = Interp::new().unwrap();
        for def in PRIMS {
            let sym = it.symbol(def.name).unwrap();
            let rm = it.reg_mark();
            it.reg_push(sym);
            let bound = it.acc_global(sym);
            assert!(bound.is_some(), "{} is not bound", def.name);
            let cell = it.cell(bound.unwrap());
            match def.kind {
                PrimKind::Proc => assert!(matches!(cell, Cell::Primitive(_))),
                PrimKind::Form => assert!(matches!(cell, Cell::SpecialForm(_))),
            }
            it.reg_release(rm);
        }
    }

    #[test]
    fn test_opcode_collisions_only_for_aliases() {
        // EXIT/QUIT/BYE and the two call/cc names intentionally share
        // opcodes; everything else must be unique.
        let mut seen: std::collections::HashMap<u8, &str> = std::collections::HashMap::new();
        for def in PRIMS {
            if let Some(first) = seen.insert(def.code.to_byte(), def.name) {
                let aliases = [
                    ("QUIT", "EXIT"),
                    ("EXIT", "BYE"),
                    ("QUIT", "BYE"),
                    ("CALL/CC", "CALL-WITH-CURRENT-CONTINUATION"),
                ];
                let pair_ok = aliases
                    .iter()
                    .any(|(a, b)| (first == *a && def.name == *b) || (first == *b && def.name == *a));
                assert!(pair_ok, "opcode collision: {} vs {}", first, def.name);
            }
        }
    }

    #[test]
    fn test_arity_encodings() {
        let exact = PRIMS.iter().find(|d| d.name == "CAR").unwrap();
        assert!(check_arity(exact, 1).is_ok());
        assert!(check_arity(exact, 0).is_err());
        assert!(check_arity(exact, 2).is_err());
        assert!(!exact.is_variadic());

        let at_least = PRIMS.iter().find(|d| d.name == "APPEND").unwrap();
        assert!(check_arity(at_least, 2).is_ok());
        assert!(check_arity(at_least, 5).is_ok());
        assert!(check_arity(at_least, 1).is_err());
        assert!(at_least.is_variadic());

        let between = PRIMS.iter().find(|d| d.name == "IF").unwrap();
        assert!(check_arity(between, 2).is_ok());
        assert!(check_arity(between, 3).is_ok());
        assert!(check_arity(between, 4).is_err());
        assert!(between.is_variadic());

        let zero_or_more = PRIMS.iter().find(|d| d.name == "+").unwrap();
        assert!(check_arity(zero_or_more, 0).is_ok());
        assert!(check_arity(zero_or_more, 9).is_ok());
    }
}
