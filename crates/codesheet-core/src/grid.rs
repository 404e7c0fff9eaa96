//! Sparse storage for cell code, row heights, column widths and macros.

use std::collections::{BTreeMap, HashMap};

use codesheet_engine::engine::{Key, Shape};

/// A value per selected cell, nested one level per sliced axis.
#[derive(Clone, Debug, PartialEq)]
pub enum Nested<T> {
    Item(T),
    List(Vec<Nested<T>>),
}

impl<T> Nested<T> {
    pub fn map<U>(self, f: &mut impl FnMut(T) -> U) -> Nested<U> {
        match self {
            Nested::Item(v) => Nested::Item(f(v)),
            Nested::List(items) => Nested::List(items.into_iter().map(|i| i.map(f)).collect()),
        }
    }

    /// The value when nothing was sliced.
    pub fn into_item(self) -> Option<T> {
        match self {
            Nested::Item(v) => Some(v),
            Nested::List(_) => None,
        }
    }

    /// All values in row-major order.
    pub fn flatten(self) -> Vec<T> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<T>) {
        match self {
            Nested::Item(v) => out.push(v),
            Nested::List(items) => items.into_iter().for_each(|i| i.flatten_into(out)),
        }
    }
}

/// Code text read through a slice.
pub type Cells = Nested<Option<String>>;

/// Sparse `Key → code` map plus size and macro storage.
///
/// A cell is present iff it has non-empty code. Bounds are enforced by
/// [`crate::DataArray`], not here.
#[derive(Clone, Debug, PartialEq)]
pub struct DictGrid {
    cells: HashMap<Key, String>,
    row_heights: HashMap<(usize, usize), f64>,
    col_widths: HashMap<(usize, usize), f64>,
    macros: String,
    shape: Shape,
}

impl DictGrid {
    pub fn new(shape: Shape) -> DictGrid {
        DictGrid {
            cells: HashMap::new(),
            row_heights: HashMap::new(),
            col_widths: HashMap::new(),
            macros: String::new(),
            shape,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub fn get(&self, key: &Key) -> Option<&str> {
        self.cells.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.cells.contains_key(key)
    }

    /// Store `code`, returning the previous code. Empty code removes the cell.
    pub(crate) fn insert(&mut self, key: Key, code: String) -> Option<String> {
        if code.is_empty() {
            return self.cells.remove(&key);
        }
        self.cells.insert(key, code)
    }

    pub(crate) fn remove(&mut self, key: &Key) -> Option<String> {
        self.cells.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.cells.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &String)> {
        self.cells.iter()
    }

    /// Keys in `(row, col, table)` order.
    pub fn sorted_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.cells.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn row_height(&self, row: usize, table: usize) -> Option<f64> {
        self.row_heights.get(&(row, table)).copied()
    }

    pub fn col_width(&self, col: usize, table: usize) -> Option<f64> {
        self.col_widths.get(&(col, table)).copied()
    }

    pub(crate) fn set_row_height(&mut self, row: usize, table: usize, height: Option<f64>) {
        match height {
            Some(h) => self.row_heights.insert((row, table), h),
            None => self.row_heights.remove(&(row, table)),
        };
    }

    pub(crate) fn set_col_width(&mut self, col: usize, table: usize, width: Option<f64>) {
        match width {
            Some(w) => self.col_widths.insert((col, table), w),
            None => self.col_widths.remove(&(col, table)),
        };
    }

    /// Explicit row heights keyed by `(row, table)`, sorted.
    pub fn row_heights(&self) -> BTreeMap<(usize, usize), f64> {
        self.row_heights.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Explicit column widths keyed by `(col, table)`, sorted.
    pub fn col_widths(&self) -> BTreeMap<(usize, usize), f64> {
        self.col_widths.iter().map(|(k, v)| (*k, *v)).collect()
    }

    pub fn macros(&self) -> &str {
        &self.macros
    }

    pub(crate) fn set_macros(&mut self, macros: String) -> String {
        std::mem::replace(&mut self.macros, macros)
    }
}
