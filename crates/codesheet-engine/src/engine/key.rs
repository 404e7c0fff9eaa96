//! Cell keys, grid shapes and index components.
//!
//! A cell is addressed by `(row, col, table)`, all zero-indexed. Index
//! components used for reads and writes are either a single integer or a
//! Python-style slice `start:stop:step`.
//!
//! # Examples
//!
//! ```ignore
//! let s = Slice::new(Some(1), None, Some(2));
//! assert_eq!(s.indices(6), vec![1, 3, 5]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of grid dimensions (rows, columns, tables).
pub const RANK: usize = 3;

/// A cell address (0-indexed).
#[derive(
    Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct Key {
    pub row: usize,
    pub col: usize,
    pub table: usize,
}

impl Key {
    pub const fn new(row: usize, col: usize, table: usize) -> Key {
        Key { row, col, table }
    }

    /// Component along `axis` (0 = row, 1 = col, 2 = table).
    pub fn get(&self, axis: usize) -> Option<usize> {
        match axis {
            0 => Some(self.row),
            1 => Some(self.col),
            2 => Some(self.table),
            _ => None,
        }
    }

    /// Copy of this key with the component along `axis` replaced.
    pub fn with(&self, axis: usize, value: usize) -> Key {
        let mut key = *self;
        match axis {
            0 => key.row = value,
            1 => key.col = value,
            2 => key.table = value,
            _ => {}
        }
        key
    }

    /// Sort key for searches: table first, then column, then row.
    pub fn search_order(&self) -> (usize, usize, usize) {
        (self.table, self.col, self.row)
    }
}

impl From<(usize, usize, usize)> for Key {
    fn from((row, col, table): (usize, usize, usize)) -> Key {
        Key { row, col, table }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.col, self.table)
    }
}

/// Grid extent along each axis.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
    pub tables: usize,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize, tables: usize) -> Shape {
        Shape { rows, cols, tables }
    }

    pub fn get(&self, axis: usize) -> Option<usize> {
        match axis {
            0 => Some(self.rows),
            1 => Some(self.cols),
            2 => Some(self.tables),
            _ => None,
        }
    }

    pub fn with(&self, axis: usize, value: usize) -> Shape {
        let mut shape = *self;
        match axis {
            0 => shape.rows = value,
            1 => shape.cols = value,
            2 => shape.tables = value,
            _ => {}
        }
        shape
    }

    pub fn contains(&self, key: &Key) -> bool {
        key.row < self.rows && key.col < self.cols && key.table < self.tables
    }

    /// True when every extent is at least one.
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0 && self.tables > 0
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((rows, cols, tables): (usize, usize, usize)) -> Shape {
        Shape { rows, cols, tables }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.rows, self.cols, self.tables)
    }
}

/// A Python-style slice. Missing bounds default to the whole axis.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub const fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Slice {
        Slice { start, stop, step }
    }

    /// `start..stop` with unit step.
    pub const fn range(start: i64, stop: i64) -> Slice {
        Slice::new(Some(start), Some(stop), None)
    }

    /// The whole axis (`:`).
    pub const fn full() -> Slice {
        Slice::new(None, None, None)
    }

    /// Indices this slice selects on an axis of `len` elements.
    ///
    /// Negative bounds count from the end and out-of-range bounds are
    /// clamped. A zero step selects nothing; callers reject it beforehand.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let step = self.step.unwrap_or(1);
        let normalize = |v: i64| if v < 0 { v + len } else { v };

        let mut out = Vec::new();
        if step > 0 {
            let start = self.start.map(normalize).unwrap_or(0).clamp(0, len);
            let stop = self.stop.map(normalize).unwrap_or(len).clamp(0, len);
            let mut i = start;
            while i < stop {
                out.push(i as usize);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        } else if step < 0 {
            let start = self
                .start
                .map(normalize)
                .unwrap_or(len - 1)
                .clamp(-1, len - 1);
            let stop = self.stop.map(normalize).unwrap_or(-1).clamp(-1, len - 1);
            let mut i = start;
            while i > stop {
                out.push(i as usize);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        }
        out
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}", part(self.start), part(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

/// One component of a cell index.
#[derive(Clone, Debug, PartialEq)]
pub enum Index {
    At(i64),
    Slice(Slice),
    /// Textual addressing; reserved and always rejected by the grid.
    Name(String),
}

impl Index {
    pub fn is_at(&self) -> bool {
        matches!(self, Index::At(_))
    }
}

impl From<i64> for Index {
    fn from(i: i64) -> Index {
        Index::At(i)
    }
}

impl From<usize> for Index {
    fn from(i: usize) -> Index {
        Index::At(i as i64)
    }
}

impl From<Slice> for Index {
    fn from(s: Slice) -> Index {
        Index::Slice(s)
    }
}

impl From<std::ops::Range<i64>> for Index {
    fn from(r: std::ops::Range<i64>) -> Index {
        Index::Slice(Slice::range(r.start, r.end))
    }
}

impl From<std::ops::RangeFull> for Index {
    fn from(_: std::ops::RangeFull) -> Index {
        Index::Slice(Slice::full())
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::At(i) => write!(f, "{}", i),
            Index::Slice(s) => write!(f, "{}", s),
            Index::Name(n) => write!(f, "{:?}", n),
        }
    }
}

/// A full `(row, col, table)` index, each component an integer or a slice.
#[derive(Clone, Debug, PartialEq)]
pub struct CellIndex(pub [Index; RANK]);

impl CellIndex {
    pub fn new(row: impl Into<Index>, col: impl Into<Index>, table: impl Into<Index>) -> CellIndex {
        CellIndex([row.into(), col.into(), table.into()])
    }

    /// The single key addressed when all components are non-negative integers.
    pub fn as_key(&self) -> Option<Key> {
        match &self.0 {
            [Index::At(r), Index::At(c), Index::At(t)] if *r >= 0 && *c >= 0 && *t >= 0 => {
                Some(Key::new(*r as usize, *c as usize, *t as usize))
            }
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.0.iter().all(Index::is_at)
    }
}

impl From<Key> for CellIndex {
    fn from(key: Key) -> CellIndex {
        CellIndex::new(key.row, key.col, key.table)
    }
}

impl From<(usize, usize, usize)> for CellIndex {
    fn from(key: (usize, usize, usize)) -> CellIndex {
        CellIndex::from(Key::from(key))
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}
