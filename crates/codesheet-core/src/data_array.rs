//! Journaled grid model.
//!
//! [`DataArray`] owns the sparse grid, the attribute list and the undo
//! journal. Every mutation goes through [`DataArray::commit`], which applies
//! an [`Op`] and records it; undo and redo replay ops without recording.

use std::collections::BTreeMap;
use std::sync::Arc;

use codesheet_engine::engine::{CellIndex, Index, Key, RANK, Shape};

use crate::attributes::{AttrDict, AttrEntry, CellAttributes};
use crate::error::{CodesheetError, Result};
use crate::grid::{Cells, DictGrid, Nested};
use crate::selection::Selection;
use crate::settings::Settings;
use crate::unredo::{Op, UndoRedo};

/// Dimension for row height / column width storage
#[derive(Copy, Clone, Debug)]
enum Dimension {
    Row,
    Column,
}

/// Everything a sheet stores, as plain data.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetData {
    pub shape: Shape,
    pub grid: BTreeMap<Key, String>,
    pub attributes: Vec<AttrEntry>,
    pub row_heights: BTreeMap<(usize, usize), f64>,
    pub col_widths: BTreeMap<(usize, usize), f64>,
    pub macros: String,
}

impl SheetData {
    pub fn new(shape: Shape) -> SheetData {
        SheetData {
            shape,
            grid: BTreeMap::new(),
            attributes: Vec::new(),
            row_heights: BTreeMap::new(),
            col_widths: BTreeMap::new(),
            macros: String::new(),
        }
    }
}

/// An index component resolved against the grid shape.
enum Resolved {
    Fixed(usize),
    Many(Vec<usize>),
}

fn nest(resolved: &[Resolved; RANK], axis: usize, partial: [usize; RANK]) -> Nested<Key> {
    if axis == RANK {
        return Nested::Item(Key::new(partial[0], partial[1], partial[2]));
    }
    let at = |i: usize| {
        let mut p = partial;
        p[axis] = i;
        nest(resolved, axis + 1, p)
    };
    match &resolved[axis] {
        Resolved::Fixed(i) => at(*i),
        Resolved::Many(indices) => Nested::List(indices.iter().map(|&i| at(i)).collect()),
    }
}

fn coord(key: &Key, axis: usize) -> usize {
    key.get(axis).unwrap_or_default()
}

fn clamp_shape(shape: Shape) -> Shape {
    Shape::new(shape.rows.max(1), shape.cols.max(1), shape.tables.max(1))
}

/// The grid model: cells, sizes, attributes and macros behind an undo journal.
#[derive(Clone, Debug)]
pub struct DataArray {
    grid: DictGrid,
    attributes: CellAttributes,
    journal: UndoRedo,
    settings: Settings,
}

impl PartialEq for DataArray {
    fn eq(&self, other: &Self) -> bool {
        self.grid == other.grid && self.attributes == other.attributes
    }
}

impl DataArray {
    /// Create an empty grid. Zero extents are raised to one.
    pub fn new(shape: Shape) -> DataArray {
        DataArray::with_settings(shape, Settings::default())
    }

    pub fn with_settings(shape: Shape, settings: Settings) -> DataArray {
        DataArray {
            grid: DictGrid::new(clamp_shape(shape)),
            attributes: CellAttributes::new(),
            journal: UndoRedo::new(settings.max_unredo),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.journal.set_max_steps(settings.max_unredo);
        self.settings = settings;
    }

    pub fn shape(&self) -> Shape {
        self.grid.shape()
    }

    pub fn grid(&self) -> &DictGrid {
        &self.grid
    }

    pub fn attributes(&self) -> &CellAttributes {
        &self.attributes
    }

    pub fn journal(&self) -> &UndoRedo {
        &self.journal
    }

    pub fn code(&self, key: Key) -> Option<&str> {
        self.grid.get(&key)
    }

    /// Keys holding code, in `(row, col, table)` order.
    pub fn keys(&self) -> Vec<Key> {
        self.grid.sorted_keys()
    }

    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    pub fn macros(&self) -> &str {
        self.grid.macros()
    }

    fn axis_size(&self, axis: usize) -> Result<usize> {
        self.shape().get(axis).ok_or(CodesheetError::InvalidAxis(axis))
    }

    fn check_index(&self, axis: usize, index: usize) -> Result<()> {
        let size = self.axis_size(axis)?;
        if index >= size {
            return Err(CodesheetError::OutOfBounds {
                axis,
                index: index as i64,
                size,
            });
        }
        Ok(())
    }

    /// Resolve `index` to the keys it addresses, nested per sliced axis.
    pub fn resolve(&self, index: &CellIndex) -> Result<Nested<Key>> {
        let shape = self.shape();
        let mut resolved = Vec::with_capacity(RANK);
        for (axis, component) in index.0.iter().enumerate() {
            let size = shape.get(axis).unwrap_or_default();
            let r = match component {
                Index::At(i) => {
                    if *i < 0 || *i as usize >= size {
                        return Err(CodesheetError::OutOfBounds {
                            axis,
                            index: *i,
                            size,
                        });
                    }
                    Resolved::Fixed(*i as usize)
                }
                Index::Slice(s) => {
                    if s.step == Some(0) {
                        return Err(CodesheetError::Unsupported(
                            "slice step cannot be zero".to_string(),
                        ));
                    }
                    Resolved::Many(s.indices(size))
                }
                Index::Name(name) => {
                    return Err(CodesheetError::Unsupported(format!(
                        "textual cell address {:?}",
                        name
                    )));
                }
            };
            resolved.push(r);
        }
        let resolved: [Resolved; RANK] = resolved
            .try_into()
            .map_err(|_| CodesheetError::Unsupported("cell index must have three components".into()))?;
        Ok(nest(&resolved, 0, [0; RANK]))
    }

    /// Code at `index`; slices give nested results.
    pub fn get(&self, index: &CellIndex) -> Result<Cells> {
        let keys = self.resolve(index)?;
        Ok(keys.map(&mut |key| self.code(key).map(str::to_owned)))
    }

    /// Store `value` at every addressed cell. Empty or `None` deletes.
    ///
    /// Writes to a merged cell other than the merge area's top-left are
    /// ignored. Returns whether anything changed.
    pub fn set(
        &mut self,
        index: &CellIndex,
        value: Option<&str>,
        mark_unredo: bool,
    ) -> Result<bool> {
        let keys = self.resolve(index)?.flatten();
        let value = value.filter(|v| !v.is_empty());
        let mut changed = false;
        for key in keys {
            let prev = self.grid.get(&key).map(str::to_owned);
            match value {
                None => {
                    if prev.is_some() {
                        self.commit(Op::SetCell {
                            key,
                            prev,
                            new: None,
                        });
                        changed = true;
                    }
                }
                Some(code) => {
                    if let Some(anchor) = self.attributes.get_merging_cell(key)
                        && anchor != key
                    {
                        continue;
                    }
                    if prev.as_deref() == Some(code) {
                        continue;
                    }
                    self.commit(Op::SetCell {
                        key,
                        prev,
                        new: Some(code.to_string()),
                    });
                    changed = true;
                }
            }
        }
        if changed && mark_unredo {
            self.journal.mark();
        }
        Ok(changed)
    }

    /// Remove code at every addressed cell.
    pub fn clear_cell(&mut self, index: &CellIndex, mark_unredo: bool) -> Result<bool> {
        self.set(index, None, mark_unredo)
    }

    /// Resize the grid. Cells outside the new shape are removed.
    pub fn set_shape(&mut self, shape: Shape, mark_unredo: bool) -> Result<()> {
        if !shape.is_valid() {
            return Err(CodesheetError::InvalidShape(shape.to_string()));
        }
        let prev = self.shape();
        if prev == shape {
            return Ok(());
        }
        let outside: Vec<(Key, String)> = self
            .grid
            .iter()
            .filter(|(key, _)| !shape.contains(key))
            .map(|(key, code)| (*key, code.clone()))
            .collect();
        for (key, code) in outside {
            self.commit(Op::SetCell {
                key,
                prev: Some(code),
                new: None,
            });
        }
        self.commit(Op::SetShape { prev, new: shape });
        if mark_unredo {
            self.journal.mark();
        }
        tracing::debug!(%prev, new = %shape, "grid resized");
        Ok(())
    }

    /// Insert `n` rows, columns or tables before `point` along `axis`.
    ///
    /// Row and column inserts move cells of `table` only (all tables when
    /// `None`); the shape always grows by `n`.
    pub fn insert(
        &mut self,
        point: i64,
        n: i64,
        axis: usize,
        table: Option<usize>,
        mark_unredo: bool,
    ) -> Result<()> {
        let size = self.axis_size(axis)?;
        if n < 0 {
            return Err(CodesheetError::InvalidCount(format!(
                "cannot insert {} items",
                n
            )));
        }
        let point = if point < 0 { point + size as i64 } else { point };
        if point < 0 || point > size as i64 {
            return Err(CodesheetError::OutOfBounds {
                axis,
                index: point,
                size,
            });
        }
        if n == 0 {
            return Ok(());
        }
        let point = point as usize;
        let table = if axis == 2 { None } else { table };

        let prev = self.shape();
        let new_shape = prev.with(axis, size + n as usize);
        self.commit(Op::SetShape {
            prev,
            new: new_shape,
        });
        self.move_cells(axis, point, n, table);
        self.shift_sizes(axis, point, n, table);
        self.shift_attributes(axis, point, n, table, new_shape);
        if mark_unredo {
            self.journal.mark();
        }
        tracing::debug!(axis, point, n, "inserted");
        Ok(())
    }

    /// Delete `n` rows, columns or tables starting at `point` along `axis`.
    ///
    /// Cells in the band are dropped and later ones move back by `n`. The
    /// shape shrinks unless a row or column delete is limited to one table.
    pub fn delete(
        &mut self,
        point: i64,
        n: i64,
        axis: usize,
        table: Option<usize>,
        mark_unredo: bool,
    ) -> Result<()> {
        let size = self.axis_size(axis)?;
        if n < 0 {
            return Err(CodesheetError::InvalidCount(format!(
                "cannot delete {} items",
                n
            )));
        }
        let point = if point < 0 { point + size as i64 } else { point };
        if point < 0 || point >= size as i64 {
            return Err(CodesheetError::OutOfBounds {
                axis,
                index: point,
                size,
            });
        }
        if n as usize >= size {
            return Err(CodesheetError::InvalidCount(format!(
                "cannot delete {} of {} items of axis {}",
                n, size, axis
            )));
        }
        let point = point as usize;
        let n = (n as usize).min(size - point);
        if n == 0 {
            return Ok(());
        }
        let table = if axis == 2 { None } else { table };
        let shrink = table.is_none();

        let prev = self.shape();
        let new_shape = if shrink { prev.with(axis, size - n) } else { prev };
        let n = -(n as i64);
        self.move_cells(axis, point, n, table);
        self.shift_sizes(axis, point, n, table);
        self.shift_attributes(axis, point, n, table, new_shape);
        if shrink {
            self.commit(Op::SetShape {
                prev,
                new: new_shape,
            });
        }
        if mark_unredo {
            self.journal.mark();
        }
        tracing::debug!(axis, point, n, "deleted");
        Ok(())
    }

    /// Move cells at or after `point` along `axis` by `n`. With negative
    /// `n`, cells in `point .. point - n` are dropped.
    fn move_cells(&mut self, axis: usize, point: usize, n: i64, table: Option<usize>) {
        let mut affected: Vec<(Key, String)> = self
            .grid
            .iter()
            .filter(|(key, _)| {
                coord(key, axis) >= point && table.is_none_or(|t| key.table == t)
            })
            .map(|(key, code)| (*key, code.clone()))
            .collect();
        affected.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, code) in &affected {
            self.commit(Op::SetCell {
                key: *key,
                prev: Some(code.clone()),
                new: None,
            });
        }
        for (key, code) in affected {
            let c = coord(&key, axis) as i64;
            if n < 0 && c < point as i64 - n {
                continue;
            }
            self.commit(Op::SetCell {
                key: key.with(axis, (c + n) as usize),
                prev: None,
                new: Some(code),
            });
        }
    }

    fn shift_sizes(&mut self, axis: usize, point: usize, n: i64, table: Option<usize>) {
        match axis {
            0 => self.shift_size_map(Dimension::Row, axis, point, n, table),
            1 => self.shift_size_map(Dimension::Column, axis, point, n, table),
            _ => {
                self.shift_size_map(Dimension::Row, axis, point, n, None);
                self.shift_size_map(Dimension::Column, axis, point, n, None);
            }
        }
    }

    fn shift_size_map(
        &mut self,
        dim: Dimension,
        axis: usize,
        point: usize,
        n: i64,
        table: Option<usize>,
    ) {
        let sizes = match dim {
            Dimension::Row => self.grid.row_heights(),
            Dimension::Column => self.grid.col_widths(),
        };
        let on_axis = |(index, t): (usize, usize)| if axis == 2 { t } else { index };
        let moved: Vec<((usize, usize), f64)> = sizes
            .into_iter()
            .filter(|&((index, t), _)| {
                on_axis((index, t)) >= point && (axis == 2 || table.is_none_or(|f| f == t))
            })
            .collect();

        for &((index, t), value) in &moved {
            self.commit_size(dim, index, t, Some(value), None);
        }
        for ((index, t), value) in moved {
            let c = on_axis((index, t)) as i64;
            if n < 0 && c < point as i64 - n {
                continue;
            }
            let shifted = (c + n) as usize;
            let (index, t) = if axis == 2 { (index, shifted) } else { (shifted, t) };
            self.commit_size(dim, index, t, None, Some(value));
        }
    }

    fn commit_size(
        &mut self,
        dim: Dimension,
        index: usize,
        table: usize,
        prev: Option<f64>,
        new: Option<f64>,
    ) {
        let op = match dim {
            Dimension::Row => Op::SetRowHeight {
                row: index,
                table,
                prev,
                new,
            },
            Dimension::Column => Op::SetColWidth {
                col: index,
                table,
                prev,
                new,
            },
        };
        self.commit(op);
    }

    fn shift_attributes(
        &mut self,
        axis: usize,
        point: usize,
        n: i64,
        table: Option<usize>,
        shape: Shape,
    ) {
        let new = self.attributes.shifted(point, n, axis, table, shape);
        if new.as_slice() != self.attributes.entries() {
            self.commit(Op::ReplaceAttrs {
                prev: self.attributes.entries().to_vec(),
                new,
            });
        }
    }

    pub fn row_height(&self, row: usize, table: usize) -> f64 {
        self.grid
            .row_height(row, table)
            .unwrap_or(self.settings.default_row_height)
    }

    pub fn col_width(&self, col: usize, table: usize) -> f64 {
        self.grid
            .col_width(col, table)
            .unwrap_or(self.settings.default_col_width)
    }

    pub fn set_row_height(
        &mut self,
        row: usize,
        table: usize,
        height: f64,
        mark_unredo: bool,
    ) -> Result<()> {
        self.set_size(Dimension::Row, row, table, height, mark_unredo)
    }

    pub fn set_col_width(
        &mut self,
        col: usize,
        table: usize,
        width: f64,
        mark_unredo: bool,
    ) -> Result<()> {
        self.set_size(Dimension::Column, col, table, width, mark_unredo)
    }

    fn set_size(
        &mut self,
        dim: Dimension,
        index: usize,
        table: usize,
        value: f64,
        mark_unredo: bool,
    ) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(CodesheetError::InvalidSize(value));
        }
        let (axis, prev) = match dim {
            Dimension::Row => (0, self.grid.row_height(index, table)),
            Dimension::Column => (1, self.grid.col_width(index, table)),
        };
        self.check_index(axis, index)?;
        self.check_index(2, table)?;
        if prev == Some(value) {
            return Ok(());
        }
        self.commit_size(dim, index, table, prev, Some(value));
        if mark_unredo {
            self.journal.mark();
        }
        Ok(())
    }

    /// Append an attribute entry for `selection` in `table`.
    pub fn append_attributes(
        &mut self,
        selection: Selection,
        table: usize,
        attrs: AttrDict,
        mark_unredo: bool,
    ) -> Result<()> {
        self.check_index(2, table)?;
        self.attributes
            .undoable_append(AttrEntry::new(selection, table, attrs), &mut self.journal);
        if mark_unredo {
            self.journal.mark();
        }
        Ok(())
    }

    /// Resolved attributes of `key`.
    pub fn cell_attributes(&self, key: Key) -> Arc<AttrDict> {
        self.attributes.get(key)
    }

    pub fn set_macros(&mut self, macros: &str, mark_unredo: bool) {
        let prev = self.grid.macros().to_string();
        if prev == macros {
            return;
        }
        self.commit(Op::SetMacros {
            prev,
            new: macros.to_string(),
        });
        if mark_unredo {
            self.journal.mark();
        }
    }

    /// Close the current undo step.
    pub fn mark(&mut self) {
        self.journal.mark();
    }

    pub fn can_undo(&self) -> bool {
        self.journal.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.journal.can_redo()
    }

    /// Revert the latest step.
    pub fn undo(&mut self) -> Result<()> {
        let ops = self.journal.pop_undo().ok_or(CodesheetError::NothingToUndo)?;
        for op in ops.iter().rev() {
            self.apply(&op.inverse());
        }
        tracing::debug!(ops = ops.len(), "undo");
        self.journal.push_redo(ops);
        Ok(())
    }

    /// Replay the latest undone step.
    pub fn redo(&mut self) -> Result<()> {
        let ops = self.journal.pop_redo().ok_or(CodesheetError::NothingToRedo)?;
        for op in &ops {
            self.apply(op);
        }
        tracing::debug!(ops = ops.len(), "redo");
        self.journal.push_undo(ops);
        Ok(())
    }

    /// Run `f` as one undo step, however many marks it requests.
    ///
    /// A failing `f` leaves its partial changes in place as one step; callers
    /// wanting all-or-nothing undo it.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut DataArray) -> Result<T>) -> Result<T> {
        self.journal.begin();
        let result = f(self);
        self.journal.end();
        result
    }

    /// Snapshot of everything stored.
    pub fn data(&self) -> SheetData {
        SheetData {
            shape: self.shape(),
            grid: self.grid.iter().map(|(k, v)| (*k, v.clone())).collect(),
            attributes: self.attributes.entries().to_vec(),
            row_heights: self.grid.row_heights(),
            col_widths: self.grid.col_widths(),
            macros: self.grid.macros().to_string(),
        }
    }

    /// Replace everything stored and clear the undo journal.
    pub fn set_data(&mut self, data: SheetData) -> Result<()> {
        if !data.shape.is_valid() {
            return Err(CodesheetError::InvalidShape(data.shape.to_string()));
        }
        if let Some(key) = data.grid.keys().find(|k| !data.shape.contains(k)) {
            let axis = (0..RANK)
                .find(|&a| coord(key, a) >= data.shape.get(a).unwrap_or_default())
                .unwrap_or_default();
            return Err(CodesheetError::OutOfBounds {
                axis,
                index: coord(key, axis) as i64,
                size: data.shape.get(axis).unwrap_or_default(),
            });
        }
        let mut grid = DictGrid::new(data.shape);
        for (key, code) in data.grid {
            grid.insert(key, code);
        }
        for ((row, table), h) in data.row_heights {
            grid.set_row_height(row, table, Some(h));
        }
        for ((col, table), w) in data.col_widths {
            grid.set_col_width(col, table, Some(w));
        }
        grid.set_macros(data.macros);
        self.grid = grid;
        self.attributes = CellAttributes::from_entries(data.attributes);
        self.journal.clear();
        Ok(())
    }

    fn commit(&mut self, op: Op) {
        self.apply(&op);
        self.journal.record(op);
    }

    /// Apply `op` without recording it.
    fn apply(&mut self, op: &Op) {
        match op {
            Op::SetCell { key, new, .. } => match new {
                Some(code) => {
                    self.grid.insert(*key, code.clone());
                }
                None => {
                    self.grid.remove(key);
                }
            },
            Op::SetShape { new, .. } => self.grid.set_shape(*new),
            Op::SetRowHeight {
                row, table, new, ..
            } => self.grid.set_row_height(*row, *table, *new),
            Op::SetColWidth {
                col, table, new, ..
            } => self.grid.set_col_width(*col, *table, *new),
            Op::AppendAttr { entry } => self.attributes.append(entry.clone()),
            Op::PopAttr { .. } => {
                self.attributes.pop();
            }
            Op::ReplaceAttrs { new, .. } => {
                self.attributes.replace(new.clone());
            }
            Op::SetMacros { new, .. } => {
                self.grid.set_macros(new.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttrValue, attr_dict};
    use codesheet_engine::engine::Slice;

    fn key(row: usize, col: usize, table: usize) -> CellIndex {
        CellIndex::from(Key::new(row, col, table))
    }

    fn data(shape: (usize, usize, usize), cells: &[((usize, usize, usize), &str)]) -> DataArray {
        let mut da = DataArray::new(Shape::from(shape));
        for (k, code) in cells {
            da.set(&CellIndex::from(Key::from(*k)), Some(code), true).unwrap();
        }
        da
    }

    #[test]
    fn test_set_get_and_empty_deletes() {
        let mut da = DataArray::new(Shape::new(5, 5, 1));
        assert!(da.set(&key(1, 2, 0), Some("1 + 1"), true).unwrap());
        assert_eq!(da.code(Key::new(1, 2, 0)), Some("1 + 1"));
        assert!(!da.set(&key(1, 2, 0), Some("1 + 1"), true).unwrap());
        assert!(da.set(&key(1, 2, 0), Some(""), true).unwrap());
        assert_eq!(da.cell_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_and_unsupported() {
        let mut da = DataArray::new(Shape::new(2, 2, 1));
        assert!(matches!(
            da.set(&key(2, 0, 0), Some("1"), true),
            Err(CodesheetError::OutOfBounds { axis: 0, index: 2, size: 2 })
        ));
        let named = CellIndex([Index::Name("A1".into()), Index::At(0), Index::At(0)]);
        assert!(matches!(da.get(&named), Err(CodesheetError::Unsupported(_))));
    }

    #[test]
    fn test_slice_read_nests_per_sliced_axis() {
        let da = data((3, 3, 1), &[((0, 0, 0), "a"), ((1, 0, 0), "b")]);
        let column = CellIndex::new(Slice::range(0, 3), 0i64, 0i64);
        let cells = da.get(&column).unwrap();
        assert_eq!(
            cells,
            Nested::List(vec![
                Nested::Item(Some("a".to_string())),
                Nested::Item(Some("b".to_string())),
                Nested::Item(None),
            ])
        );
        let block = CellIndex::new(Slice::range(0, 2), Slice::range(0, 2), 0i64);
        match da.get(&block).unwrap() {
            Nested::List(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected nested rows, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_write_covers_whole_axis() {
        let mut da = DataArray::new(Shape::new(4, 2, 1));
        let column = CellIndex::new(Slice::full(), 1i64, 0i64);
        da.set(&column, Some("0"), true).unwrap();
        assert_eq!(da.cell_count(), 4);
        da.undo().unwrap();
        assert_eq!(da.cell_count(), 0);
    }

    #[test]
    fn test_undo_redo_single_step() {
        let mut da = data((3, 3, 1), &[((0, 0, 0), "1")]);
        da.set(&key(0, 0, 0), Some("2"), true).unwrap();
        da.undo().unwrap();
        assert_eq!(da.code(Key::new(0, 0, 0)), Some("1"));
        da.redo().unwrap();
        assert_eq!(da.code(Key::new(0, 0, 0)), Some("2"));
        assert!(matches!(da.redo(), Err(CodesheetError::NothingToRedo)));
    }

    #[test]
    fn test_insert_rows_shifts_cells_and_shape() {
        let mut da = data((5, 2, 1), &[((0, 0, 0), "a"), ((2, 1, 0), "b")]);
        da.insert(1, 2, 0, None, true).unwrap();
        assert_eq!(da.shape(), Shape::new(7, 2, 1));
        assert_eq!(da.code(Key::new(0, 0, 0)), Some("a"));
        assert_eq!(da.code(Key::new(4, 1, 0)), Some("b"));
        assert_eq!(da.code(Key::new(2, 1, 0)), None);
    }

    #[test]
    fn test_delete_rows_drops_band() {
        let mut da = data(
            (5, 1, 1),
            &[((0, 0, 0), "a"), ((1, 0, 0), "b"), ((2, 0, 0), "c"), ((4, 0, 0), "e")],
        );
        da.delete(1, 2, 0, None, true).unwrap();
        assert_eq!(da.shape(), Shape::new(3, 1, 1));
        assert_eq!(da.keys(), vec![Key::new(0, 0, 0), Key::new(2, 0, 0)]);
        assert_eq!(da.code(Key::new(2, 0, 0)), Some("e"));

        da.undo().unwrap();
        assert_eq!(da.shape(), Shape::new(5, 1, 1));
        assert_eq!(da.code(Key::new(1, 0, 0)), Some("b"));
        assert_eq!(da.code(Key::new(4, 0, 0)), Some("e"));
    }

    #[test]
    fn test_delete_rejects_whole_axis_and_bad_axis() {
        let mut da = DataArray::new(Shape::new(3, 3, 1));
        assert!(matches!(
            da.delete(0, 3, 0, None, true),
            Err(CodesheetError::InvalidCount(_))
        ));
        assert!(matches!(
            da.delete(1, 5, 0, None, true),
            Err(CodesheetError::InvalidCount(_))
        ));
        assert_eq!(da.shape(), Shape::new(3, 3, 1));
        assert!(!da.can_undo());
        assert!(matches!(
            da.insert(0, 1, 3, None, true),
            Err(CodesheetError::InvalidAxis(3))
        ));
        assert!(matches!(
            da.insert(0, -1, 0, None, true),
            Err(CodesheetError::InvalidCount(_))
        ));
    }

    #[test]
    fn test_delete_clamps_band_to_axis_end() {
        let mut da = data((3, 1, 1), &[((0, 0, 0), "a"), ((2, 0, 0), "c")]);
        da.delete(2, 2, 0, None, true).unwrap();
        assert_eq!(da.shape(), Shape::new(2, 1, 1));
        assert_eq!(da.keys(), vec![Key::new(0, 0, 0)]);
    }

    #[test]
    fn test_insert_limited_to_table() {
        let mut da = data((3, 1, 2), &[((0, 0, 0), "t0"), ((0, 0, 1), "t1")]);
        da.insert(0, 1, 0, Some(1), true).unwrap();
        assert_eq!(da.code(Key::new(0, 0, 0)), Some("t0"));
        assert_eq!(da.code(Key::new(1, 0, 1)), Some("t1"));
    }

    #[test]
    fn test_insert_tables_moves_sizes() {
        let mut da = DataArray::new(Shape::new(3, 3, 2));
        da.set_row_height(1, 1, 45.0, true).unwrap();
        da.insert(0, 1, 2, None, true).unwrap();
        assert_eq!(da.row_height(1, 2), 45.0);
        assert_eq!(da.row_height(1, 1), da.settings().default_row_height);
    }

    #[test]
    fn test_set_shape_drops_outside_cells() {
        let mut da = data((4, 4, 1), &[((3, 3, 0), "x"), ((0, 0, 0), "y")]);
        da.set_shape(Shape::new(2, 2, 1), true).unwrap();
        assert_eq!(da.cell_count(), 1);
        da.undo().unwrap();
        assert_eq!(da.shape(), Shape::new(4, 4, 1));
        assert_eq!(da.code(Key::new(3, 3, 0)), Some("x"));
        assert!(matches!(
            da.set_shape(Shape::new(0, 1, 1), true),
            Err(CodesheetError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_merged_cells_only_accept_anchor_writes() {
        let mut da = DataArray::new(Shape::new(4, 4, 1));
        da.append_attributes(
            Selection::block((0, 0), (1, 1)),
            0,
            attr_dict([("merge_area", AttrValue::merge_area(0, 0, 1, 1))]),
            true,
        )
        .unwrap();
        assert!(!da.set(&key(1, 1, 0), Some("x"), true).unwrap());
        assert!(da.set(&key(0, 0, 0), Some("x"), true).unwrap());
    }

    #[test]
    fn test_sizes_validate_and_undo() {
        let mut da = DataArray::new(Shape::new(3, 3, 1));
        assert!(matches!(
            da.set_col_width(0, 0, -1.0, true),
            Err(CodesheetError::InvalidSize(_))
        ));
        da.set_col_width(2, 0, 55.0, true).unwrap();
        assert_eq!(da.col_width(2, 0), 55.0);
        da.undo().unwrap();
        assert_eq!(da.col_width(2, 0), 100.0);
    }

    #[test]
    fn test_transaction_is_one_step() {
        let mut da = DataArray::new(Shape::new(3, 3, 1));
        da.transaction(|da| {
            da.set(&key(0, 0, 0), Some("1"), true)?;
            da.set(&key(1, 0, 0), Some("2"), true)?;
            da.set_macros("x = 1", true);
            Ok(())
        })
        .unwrap();
        da.undo().unwrap();
        assert_eq!(da.cell_count(), 0);
        assert_eq!(da.macros(), "");
        assert!(!da.can_undo());
    }

    #[test]
    fn test_set_data_replaces_and_clears_journal() {
        let mut da = data((2, 2, 1), &[((0, 0, 0), "old")]);
        let mut snapshot = SheetData::new(Shape::new(5, 5, 2));
        snapshot.grid.insert(Key::new(4, 4, 1), "new".to_string());
        snapshot.macros = "m".to_string();
        da.set_data(snapshot.clone()).unwrap();
        assert_eq!(da.data(), snapshot);
        assert!(!da.can_undo());

        let mut bad = SheetData::new(Shape::new(1, 1, 1));
        bad.grid.insert(Key::new(0, 3, 0), "x".to_string());
        assert!(matches!(
            da.set_data(bad),
            Err(CodesheetError::OutOfBounds { axis: 1, .. })
        ));
    }
}
