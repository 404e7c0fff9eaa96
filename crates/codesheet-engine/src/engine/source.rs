//! The seam between the evaluation engine and the grid that owns the cells.

use dashmap::DashMap;
use rhai::{Dynamic, Engine, EvalAltResult};
use std::sync::{Arc, Weak};

use super::key::{CellIndex, Key, Shape};

/// Evaluated cell values keyed by cell. Shared between the owner and engine.
pub type ValueCache = Arc<DashMap<Key, Dynamic>>;

/// Grid access needed by the builtins.
///
/// Implementations must not hold locks while evaluating a cell: evaluation
/// re-enters the source through `CELL`.
pub trait CellSource: Send + Sync {
    /// Evaluated value at `index`. Slice components yield nested arrays, one
    /// level per sliced axis.
    fn value(&self, engine: &Engine, index: CellIndex) -> Result<Dynamic, Box<EvalAltResult>>;

    /// Code text stored at `key`.
    fn code(&self, key: Key) -> Option<String>;

    fn shape(&self) -> Shape;

    /// Store (or with `None`, remove) code at `key` from a macro.
    fn set_code(&self, key: Key, code: Option<String>) -> Result<(), String>;
}

/// The grid handle bound to `S` inside cell code.
///
/// Holds a weak reference so scripts that stash `S` in a global do not keep
/// the grid alive.
#[derive(Clone)]
pub struct SheetRef(Weak<dyn CellSource>);

impl SheetRef {
    pub fn new(source: &Arc<dyn CellSource>) -> SheetRef {
        SheetRef(Arc::downgrade(source))
    }

    pub fn source(&self) -> Option<Arc<dyn CellSource>> {
        self.0.upgrade()
    }
}

impl std::fmt::Debug for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SheetRef")
    }
}
