//! Schemetron - a Scheme language processor.
//!
//! A complete runtime that reads textual Scheme source, evaluates it
//! against a global environment, and prints results in an interactive
//! read-eval-print loop. First-class closures and continuations, proper
//! tail calls, user-definable macros, and the standard data types (pairs,
//! symbols, strings, characters, numbers, vectors, ports).
//!
//! # Architecture
//!
//! The machine is an explicit-continuation stack evaluator: all Scheme-level
//! control lives on four first-class stacks (expression, value, function,
//! register) rather than the host call stack, which is what makes
//! `call/cc` a snapshot-and-restore operation and tail calls free.
//!
//! 1. **Scanning and reading** (`scanner`, `backend::reader`) - tokens from
//!    ports, cell trees from tokens.
//! 2. **Evaluation** (`backend::eval`) - a single dispatch loop over the
//!    expression stack; special forms suspend and resume themselves instead
//!    of recursing.
//! 3. **Compilation** (`backend::bytecode`) - `*compile*` turns expression
//!    trees into small bytecode blocks; the VM runs them on the same stacks
//!    and environment, escaping back to the tree walker for calls,
//!    `eval`, `apply`, and `call/cc`.
//! 4. **Memory** (`backend::heap`) - every value is a tagged cell in one
//!    mark-sweep arena rooted in the stacks and the current environment.
//!
//! # Example
//!
//! ```
//! use schemetron::Interp;
//!
//! let mut interp = Interp::new().unwrap();
//! let results = interp
//!     .eval_str("(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 10)")
//!     .unwrap();
//! assert_eq!(results, vec!["FACT", "3628800"]);
//! ```

pub mod backend;
pub mod repl;
pub mod scanner;

pub use backend::{Cell, CellRef, CompileError, EvalResult, Interp, SchemeError};
pub use scanner::Token;
