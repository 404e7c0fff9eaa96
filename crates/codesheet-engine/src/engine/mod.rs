//! Cell evaluation engine API.
//!
//! This module provides the computation engine behind the grid:
//!
//! - [`Key`], [`Shape`], [`Index`], [`CellIndex`] - Cell addressing
//! - [`preprocess_script`] - Rewrite `S[...]` subscripts for Rhai evaluation
//! - [`create_engine`], [`eval_cell`] - Rhai engine with builtins registered
//! - [`Watchdog`] - Deadline shared by nested evaluations
//! - [`EvalError`] - Failures stored as cell results
//! - [`format_dynamic`] - Format values for display

mod error;
mod eval;
mod format;
mod key;
mod preprocess;
mod source;
mod watchdog;

pub use error::{EvalError, EvalErrorKind, traceback};
pub use eval::{
    MacroOutput, compile_cell, create_engine, create_script_engine, eval_cell,
    eval_cell_with_functions, materialize,
};
pub use format::{format_dynamic, format_number, format_truncated};
pub use key::{CellIndex, Index, Key, RANK, Shape, Slice};
pub use preprocess::{
    assignment_target, declare_trailing_assignment, last_statement, preprocess_script,
};
pub use source::{CellSource, SheetRef, ValueCache};
pub use watchdog::{Watchdog, WatchdogGuard};

pub use rhai::{AST, Dynamic, Scope};
