//! Rhai engine creation and cell code evaluation.
//!
//! Creates the Rhai engine with all grid builtins registered (CELL, SLICE,
//! SUM, ...) and evaluates a cell's code against a scope. Also creates the
//! macro engine, which adds write builtins and captures printed output.

use rhai::{Array, Dynamic, Engine, EvalAltResult, Scope, AST};
use std::ops::{Range, RangeInclusive};
use std::sync::{Arc, Mutex, PoisonError};

use super::preprocess::{
    assignment_target, declare_trailing_assignment, last_statement, preprocess_script,
};
use super::source::CellSource;
use super::watchdog::Watchdog;

/// Create a Rhai engine for cell evaluation with builtins registered.
pub fn create_engine(source: Arc<dyn CellSource>, watchdog: &Watchdog) -> Engine {
    let mut engine = Engine::new();
    watchdog.install(&mut engine);
    crate::builtins::register_builtins(&mut engine, source);
    engine
}

/// Text printed by a macro run, split into standard output and standard error.
#[derive(Clone, Debug, Default)]
pub struct MacroOutput {
    out: Arc<Mutex<String>>,
    err: Arc<Mutex<String>>,
}

impl MacroOutput {
    pub fn write_out(&self, text: &str) {
        push_line(&self.out, text);
    }

    pub fn write_err(&self, text: &str) {
        push_line(&self.err, text);
    }

    /// Drain both buffers as `(out, err)`.
    pub fn take(&self) -> (String, String) {
        let take = |buf: &Mutex<String>| {
            std::mem::take(&mut *buf.lock().unwrap_or_else(PoisonError::into_inner))
        };
        (take(&self.out), take(&self.err))
    }
}

fn push_line(buf: &Mutex<String>, text: &str) {
    let mut buf = buf.lock().unwrap_or_else(PoisonError::into_inner);
    buf.push_str(text);
    if !text.ends_with('\n') {
        buf.push('\n');
    }
}

/// Create a Rhai engine for macro execution.
/// This engine includes all cell builtins plus write operations
/// (`SET_CELL`, `CLEAR_CELL`). `print` goes to `output`'s out buffer and
/// `debug` to its err buffer.
pub fn create_script_engine(
    source: Arc<dyn CellSource>,
    watchdog: &Watchdog,
    output: MacroOutput,
) -> Engine {
    let mut engine = create_engine(source.clone(), watchdog);
    crate::builtins::register_script_builtins(&mut engine, source);

    let out = output.clone();
    engine.on_print(move |text| out.write_out(text));
    let err = output;
    engine.on_debug(move |text, _source, pos| {
        if pos.is_none() {
            err.write_err(text);
        } else {
            err.write_err(&format!("{} @ {}", text, pos));
        }
    });
    engine
}

/// Compile cell code after rewriting grid subscripts.
pub fn compile_cell(engine: &Engine, code: &str) -> Result<AST, Box<EvalAltResult>> {
    let processed = preprocess_script(code);
    engine.compile(&processed).map_err(|e| {
        let parse_type = *e.0;
        let pos = e.1;
        Box::new(EvalAltResult::ErrorParsing(parse_type, pos))
    })
}

/// Evaluate cell code in `scope`.
///
/// Code ending in an assignment yields the assigned value. Ranges are
/// materialized into arrays.
pub fn eval_cell(
    engine: &Engine,
    scope: &mut Scope,
    code: &str,
) -> Result<Dynamic, Box<EvalAltResult>> {
    eval_cell_with_functions(engine, scope, code, None)
}

/// Evaluate cell code with the script functions of `functions` in reach.
pub fn eval_cell_with_functions(
    engine: &Engine,
    scope: &mut Scope,
    code: &str,
    functions: Option<&AST>,
) -> Result<Dynamic, Box<EvalAltResult>> {
    let code = declare_trailing_assignment(code, |name| scope.contains(name));
    let mut ast = compile_cell(engine, &code)?;
    if let Some(functions) = functions {
        ast = functions.merge(&ast);
    }
    let value = engine.eval_ast_with_scope::<Dynamic>(scope, &ast)?;
    if value.is_unit()
        && let Some(name) = assignment_target(last_statement(&code))
        && let Some(bound) = scope.get_value::<Dynamic>(name)
    {
        return Ok(materialize(bound));
    }
    Ok(materialize(value))
}

/// Turn lazily iterated values into arrays.
pub fn materialize(value: Dynamic) -> Dynamic {
    if value.is::<Range<i64>>() {
        let range = value.cast::<Range<i64>>();
        return Dynamic::from_array(range.map(Dynamic::from).collect::<Array>());
    }
    if value.is::<RangeInclusive<i64>>() {
        let range = value.cast::<RangeInclusive<i64>>();
        return Dynamic::from_array(range.map(Dynamic::from).collect::<Array>());
    }
    value
}
