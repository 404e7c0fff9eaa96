use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use codesheet_engine::engine::{
    AST, CellIndex, CellSource, Dynamic, EvalError, EvalErrorKind, Key, Scope, Shape, SheetRef,
    ValueCache, Watchdog, eval_cell_with_functions,
};
use rhai::{Engine, EvalAltResult, Position};

use crate::data_array::DataArray;
use crate::error::Result;
use crate::grid::Nested;

/// Names bound per evaluation; never merged back into the globals.
pub(crate) const OVERRIDES: [&str; 7] = ["X", "Y", "Z", "R", "C", "T", "S"];

/// Scope holding the base globals every cell starts from.
pub(crate) fn base_globals() -> Scope<'static> {
    let mut scope = Scope::new();
    scope.push_constant("PI", std::f64::consts::PI);
    scope.push_constant("E", std::f64::consts::E);
    scope
}

/// Shared grid state. The engine's builtins reach it through [`CellSource`].
///
/// No lock is held while cell code runs: evaluation re-enters through `CELL`.
pub(crate) struct Sheet {
    me: Weak<Sheet>,
    data: RwLock<DataArray>,
    pub(crate) result_cache: ValueCache,
    pub(crate) frozen_cache: ValueCache,
    globals: Mutex<Scope<'static>>,
    /// Script functions defined by the last successful macro run.
    functions: Mutex<Option<AST>>,
    in_progress: Mutex<HashSet<Key>>,
    safe_mode: AtomicBool,
    pub(crate) watchdog: Watchdog,
}

impl Sheet {
    pub(crate) fn new(data: DataArray) -> Arc<Sheet> {
        Arc::new_cyclic(|me| Sheet {
            me: me.clone(),
            data: RwLock::new(data),
            result_cache: ValueCache::default(),
            frozen_cache: ValueCache::default(),
            globals: Mutex::new(base_globals()),
            functions: Mutex::new(None),
            in_progress: Mutex::new(HashSet::new()),
            safe_mode: AtomicBool::new(false),
            watchdog: Watchdog::new(),
        })
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, DataArray> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, DataArray> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn globals(&self) -> MutexGuard<'_, Scope<'static>> {
        self.globals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_functions(&self, functions: Option<AST>) {
        *self.functions.lock().unwrap_or_else(PoisonError::into_inner) = functions;
    }

    pub(crate) fn functions(&self) -> Option<AST> {
        self.functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::Relaxed)
    }

    pub(crate) fn set_safe_mode(&self, on: bool) {
        self.safe_mode.store(on, Ordering::Relaxed);
    }

    pub(crate) fn clear_caches(&self) {
        self.result_cache.clear();
        self.frozen_cache.clear();
    }

    /// The grid handle bound to `S`.
    pub(crate) fn sheet_ref(&self) -> Option<SheetRef> {
        let me: Arc<dyn CellSource> = self.me.upgrade()?;
        Some(SheetRef::new(&me))
    }

    fn is_in_progress(&self, key: Key) -> bool {
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    /// Value of one cell, going through safe mode and both caches.
    pub(crate) fn cell_value(&self, engine: &Engine, key: Key) -> Dynamic {
        if self.safe_mode() {
            return self
                .read()
                .code(key)
                .map(|code| Dynamic::from(code.to_string()))
                .unwrap_or(Dynamic::UNIT);
        }
        if self.is_in_progress(key) {
            return Dynamic::from(EvalError::cycle(key));
        }

        let frozen = self.read().attributes().is_frozen(key);
        let cache = if frozen {
            &self.frozen_cache
        } else {
            &self.result_cache
        };
        if let Some(value) = cache.get(&key).map(|v| v.value().clone()) {
            return value;
        }

        let code = self.read().code(key).map(str::to_owned);
        let Some(code) = code else {
            return Dynamic::UNIT;
        };
        let value = self.evaluate(engine, key, &code);
        // A timeout belongs to the outermost run's deadline, not to this cell.
        let timed_out = value
            .read_lock::<EvalError>()
            .is_some_and(|error| error.kind == EvalErrorKind::Timeout);
        if !timed_out {
            cache.insert(key, value.clone());
        }
        value
    }

    /// Values at `index`, nested one array level per sliced axis.
    pub(crate) fn values(&self, engine: &Engine, index: &CellIndex) -> Result<Dynamic> {
        let keys = self.read().resolve(index)?;
        Ok(self.nested_values(engine, keys))
    }

    fn nested_values(&self, engine: &Engine, keys: Nested<Key>) -> Dynamic {
        match keys {
            Nested::Item(key) => self.cell_value(engine, key),
            Nested::List(items) => Dynamic::from_array(
                items
                    .into_iter()
                    .map(|item| self.nested_values(engine, item))
                    .collect(),
            ),
        }
    }

    /// Evaluate the stored `code` of `key`, marking it in progress.
    fn evaluate(&self, engine: &Engine, key: Key, code: &str) -> Dynamic {
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        let value = self.run_code(engine, key, code);
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        value
    }

    /// Evaluate `code` as if it were the cell at `key`. Failures come back as
    /// [`EvalError`] values.
    pub(crate) fn run_code(&self, engine: &Engine, key: Key, code: &str) -> Dynamic {
        let limit = self.read().settings().timeout_duration();
        let _guard = self.watchdog.arm(limit);

        let mut scope = self.globals().clone();
        let (row, col, table) = (key.row as i64, key.col as i64, key.table as i64);
        scope.push_constant("X", row);
        scope.push_constant("R", row);
        scope.push_constant("Y", col);
        scope.push_constant("C", col);
        scope.push_constant("Z", table);
        scope.push_constant("T", table);
        if let Some(sheet) = self.sheet_ref() {
            scope.push_constant("S", sheet);
        }
        let functions = self.functions();

        match eval_cell_with_functions(engine, &mut scope, code, functions.as_ref()) {
            Ok(value) => {
                self.merge_globals(&scope);
                value
            }
            Err(err) => {
                let error = EvalError::from_rhai(&err, limit);
                if error.kind == EvalErrorKind::Timeout {
                    tracing::warn!(%key, ?limit, "cell evaluation timed out");
                }
                Dynamic::from(error)
            }
        }
    }

    /// Copy the variables a run left in `scope` into the shared globals.
    ///
    /// Cell constants are published as plain variables. Names the globals
    /// hold as constants (`PI`, `E`) are never overwritten.
    pub(crate) fn merge_globals(&self, scope: &Scope) {
        let mut globals = self.globals();
        for (name, _, value) in scope.iter() {
            if OVERRIDES.contains(&name) || globals.is_constant(name).unwrap_or(false) {
                continue;
            }
            globals.set_or_push(name, value);
        }
    }
}

fn engine_error(message: String) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(message.into(), Position::NONE).into()
}

impl CellSource for Sheet {
    fn value(
        &self,
        engine: &Engine,
        index: CellIndex,
    ) -> std::result::Result<Dynamic, Box<EvalAltResult>> {
        self.values(engine, &index)
            .map_err(|e| engine_error(e.to_string()))
    }

    fn code(&self, key: Key) -> Option<String> {
        self.read().code(key).map(str::to_owned)
    }

    fn shape(&self) -> Shape {
        self.read().shape()
    }

    fn set_code(&self, key: Key, code: Option<String>) -> std::result::Result<(), String> {
        self.write()
            .set(&CellIndex::from(key), code.as_deref(), false)
            .map_err(|e| e.to_string())?;
        self.result_cache.clear();
        Ok(())
    }
}
