//! Grid model with evaluation.
//!
//! [`CodeArray`] wraps a [`DataArray`] and evaluates cell code on read. Results
//! are cached until the next write; cells with the `frozen` attribute keep
//! their first result until [`CodeArray::refresh_frozen`].

mod find;
mod io;
mod macros;
mod sheet;

use std::sync::Arc;

use codesheet_engine::engine::{CellIndex, Dynamic, Key, Shape, SheetRef, create_engine};
use rhai::Engine;

use crate::attributes::{AttrDict, AttrValue};
use crate::data_array::{DataArray, SheetData};
use crate::error::Result;
use crate::selection::Selection;
use crate::settings::Settings;

pub use find::FindFlags;

use sheet::{Sheet, base_globals};

pub struct CodeArray {
    sheet: Arc<Sheet>,
    engine: Engine,
}

impl PartialEq for CodeArray {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.sheet, &other.sheet) || *self.sheet.read() == *other.sheet.read()
    }
}

impl std::fmt::Debug for CodeArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeArray")
            .field("data", &*self.sheet.read())
            .field("safe_mode", &self.sheet.safe_mode())
            .finish()
    }
}

impl CodeArray {
    pub fn new(shape: Shape) -> CodeArray {
        CodeArray::with_settings(shape, Settings::default())
    }

    pub fn with_settings(shape: Shape, settings: Settings) -> CodeArray {
        let sheet = Sheet::new(DataArray::with_settings(shape, settings));
        let engine = create_engine(sheet.clone(), &sheet.watchdog);
        CodeArray { sheet, engine }
    }

    /// Run `f` against the underlying model.
    pub fn with_data<R>(&self, f: impl FnOnce(&DataArray) -> R) -> R {
        f(&self.sheet.read())
    }

    pub fn settings(&self) -> Settings {
        self.sheet.read().settings().clone()
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.sheet.write().set_settings(settings);
    }

    pub fn shape(&self) -> Shape {
        self.sheet.read().shape()
    }

    /// Evaluated value at `index`; slices give nested arrays.
    pub fn get(&self, index: &CellIndex) -> Result<Dynamic> {
        self.sheet.values(&self.engine, index)
    }

    /// Evaluated value of one cell. Empty cells give `()`.
    pub fn value(&self, key: Key) -> Dynamic {
        self.sheet.cell_value(&self.engine, key)
    }

    /// Evaluate `code` as if it were stored at `key`, without storing it.
    pub fn eval_code(&self, key: Key, code: &str) -> Dynamic {
        self.sheet.run_code(&self.engine, key, code)
    }

    /// Raw code of one cell.
    pub fn code(&self, key: Key) -> Option<String> {
        self.sheet.read().code(key).map(str::to_owned)
    }

    /// Store code at every addressed cell; `None` or empty deletes.
    ///
    /// The result cache survives writes that leave every addressed cell's
    /// code as it was.
    pub fn set(
        &mut self,
        index: &CellIndex,
        code: Option<&str>,
        mark_unredo: bool,
    ) -> Result<bool> {
        let mut data = self.sheet.write();
        let keys = data.resolve(index)?.flatten();
        let new_empty = code.is_none_or(str::is_empty);
        let unchanged = keys.iter().all(|key| {
            let prior = data.code(*key);
            let cached_same = self.sheet.result_cache.contains_key(key) && prior == code;
            cached_same || (prior.is_none() && new_empty)
        });
        let changed = data.set(index, code, mark_unredo)?;
        drop(data);
        if !unchanged {
            self.sheet.result_cache.clear();
        }
        Ok(changed)
    }

    pub fn clear_cell(&mut self, index: &CellIndex, mark_unredo: bool) -> Result<bool> {
        self.set(index, None, mark_unredo)
    }

    pub fn insert(
        &mut self,
        point: i64,
        n: i64,
        axis: usize,
        table: Option<usize>,
        mark_unredo: bool,
    ) -> Result<()> {
        self.sheet.write().insert(point, n, axis, table, mark_unredo)?;
        self.sheet.result_cache.clear();
        Ok(())
    }

    pub fn delete(
        &mut self,
        point: i64,
        n: i64,
        axis: usize,
        table: Option<usize>,
        mark_unredo: bool,
    ) -> Result<()> {
        self.sheet.write().delete(point, n, axis, table, mark_unredo)?;
        self.sheet.result_cache.clear();
        Ok(())
    }

    pub fn set_shape(&mut self, shape: Shape, mark_unredo: bool) -> Result<()> {
        self.sheet.write().set_shape(shape, mark_unredo)?;
        self.sheet.result_cache.clear();
        Ok(())
    }

    pub fn row_height(&self, row: usize, table: usize) -> f64 {
        self.sheet.read().row_height(row, table)
    }

    pub fn col_width(&self, col: usize, table: usize) -> f64 {
        self.sheet.read().col_width(col, table)
    }

    pub fn set_row_height(
        &mut self,
        row: usize,
        table: usize,
        height: f64,
        mark_unredo: bool,
    ) -> Result<()> {
        self.sheet
            .write()
            .set_row_height(row, table, height, mark_unredo)
    }

    pub fn set_col_width(
        &mut self,
        col: usize,
        table: usize,
        width: f64,
        mark_unredo: bool,
    ) -> Result<()> {
        self.sheet.write().set_col_width(col, table, width, mark_unredo)
    }

    pub fn append_attributes(
        &mut self,
        selection: Selection,
        table: usize,
        attrs: AttrDict,
        mark_unredo: bool,
    ) -> Result<()> {
        self.sheet
            .write()
            .append_attributes(selection, table, attrs, mark_unredo)?;
        self.sheet.result_cache.clear();
        Ok(())
    }

    pub fn cell_attributes(&self, key: Key) -> Arc<AttrDict> {
        self.sheet.read().cell_attributes(key)
    }

    pub fn get_attr(&self, key: Key, name: &str) -> AttrValue {
        self.sheet.read().attributes().get_attr(key, name)
    }

    pub fn macros(&self) -> String {
        self.sheet.read().macros().to_string()
    }

    pub fn set_macros(&mut self, macros: &str, mark_unredo: bool) {
        self.sheet.write().set_macros(macros, mark_unredo);
    }

    pub fn mark(&mut self) {
        self.sheet.write().mark();
    }

    pub fn can_undo(&self) -> bool {
        self.sheet.read().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.sheet.read().can_redo()
    }

    pub fn undo(&mut self) -> Result<()> {
        self.sheet.write().undo()?;
        self.sheet.result_cache.clear();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        self.sheet.write().redo()?;
        self.sheet.result_cache.clear();
        Ok(())
    }

    pub fn safe_mode(&self) -> bool {
        self.sheet.safe_mode()
    }

    /// Toggle safe mode, in which reads return raw code unevaluated.
    pub fn set_safe_mode(&mut self, on: bool) {
        if self.sheet.safe_mode() != on {
            self.sheet.set_safe_mode(on);
            self.sheet.clear_caches();
            tracing::info!(safe_mode = on, "safe mode changed");
        }
    }

    /// Trust the loaded data and leave safe mode.
    pub fn approve(&mut self) {
        self.set_safe_mode(false);
    }

    /// Snapshot of everything stored.
    pub fn data(&self) -> SheetData {
        self.sheet.read().data()
    }

    /// Replace everything stored. Clears the undo journal and both caches.
    pub fn set_data(&mut self, data: SheetData) -> Result<()> {
        self.sheet.write().set_data(data)?;
        self.sheet.clear_caches();
        Ok(())
    }

    /// Drop every global except the built-in ones, and any macro functions.
    pub fn clear_globals(&mut self) {
        *self.sheet.globals() = base_globals();
        self.sheet.set_functions(None);
        self.sheet.clear_caches();
        tracing::debug!("globals cleared");
    }

    /// Rebuild the evaluation engine with a fresh set of builtins.
    pub fn reload_modules(&mut self) {
        self.engine = create_engine(self.sheet.clone(), &self.sheet.watchdog);
        self.sheet.clear_caches();
        tracing::debug!("engine rebuilt");
    }

    /// Forget the stored results of frozen cells.
    pub fn refresh_frozen(&mut self) {
        self.sheet.frozen_cache.clear();
    }

    pub fn result_cache_len(&self) -> usize {
        self.sheet.result_cache.len()
    }

    pub fn frozen_cache_len(&self) -> usize {
        self.sheet.frozen_cache.len()
    }

    /// Value of a shared global variable.
    pub fn global(&self, name: &str) -> Option<Dynamic> {
        self.sheet.globals().get_value::<Dynamic>(name)
    }

    /// The handle cell code sees as `S`.
    pub fn sheet_ref(&self) -> Option<SheetRef> {
        self.sheet.sheet_ref()
    }
}
