//! Cell attributes.
//!
//! Attributes are stored as an append-only list of `(selection, table,
//! attributes)` entries. The attributes of a cell are the defaults overlaid,
//! in list order, by every entry whose table matches and whose selection
//! contains the cell. Later entries win.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use codesheet_engine::engine::{Key, Shape};

use crate::selection::Selection;
use crate::unredo::{Op, UndoRedo};

/// A single attribute value. Mirrors the literal forms the save file uses.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<AttrValue>),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn is_none(&self) -> bool {
        matches!(self, AttrValue::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// `(top, left, bottom, right)` of a merge area value.
    pub fn as_merge_area(&self) -> Option<(usize, usize, usize, usize)> {
        let AttrValue::Tuple(items) = self else {
            return None;
        };
        let coords: Vec<usize> = items
            .iter()
            .map(|v| v.as_int().and_then(|n| usize::try_from(n).ok()))
            .collect::<Option<_>>()?;
        match coords.as_slice() {
            [top, left, bottom, right] => Some((*top, *left, *bottom, *right)),
            _ => None,
        }
    }

    pub fn merge_area(top: usize, left: usize, bottom: usize, right: usize) -> AttrValue {
        AttrValue::Tuple(
            [top, left, bottom, right]
                .into_iter()
                .map(|v| AttrValue::Int(v as i64))
                .collect(),
        )
    }
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            _ => write!(f, "{}", ch)?,
        }
    }
    f.write_str("'")
}

/// Renders the value as a Python-style literal.
impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::None => f.write_str("None"),
            AttrValue::Bool(true) => f.write_str("True"),
            AttrValue::Bool(false) => f.write_str("False"),
            AttrValue::Int(n) => write!(f, "{}", n),
            AttrValue::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Str(s) => write_str_literal(f, s),
            AttrValue::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            AttrValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Float(x)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

/// Attribute name to value, in insertion order.
pub type AttrDict = IndexMap<String, AttrValue>;

/// Build an [`AttrDict`] from `(name, value)` pairs.
pub fn attr_dict<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> AttrDict
where
    K: Into<String>,
    V: Into<AttrValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn rgb(r: i64, g: i64, b: i64) -> AttrValue {
    AttrValue::Tuple(vec![AttrValue::Int(r), AttrValue::Int(g), AttrValue::Int(b)])
}

/// Attributes every cell starts with.
pub fn default_attributes() -> &'static AttrDict {
    static DEFAULTS: OnceLock<AttrDict> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        let mut d = AttrDict::new();
        d.insert("borderwidth_bottom".into(), AttrValue::Int(1));
        d.insert("borderwidth_right".into(), AttrValue::Int(1));
        d.insert("bordercolor_bottom".into(), rgb(0, 0, 0));
        d.insert("bordercolor_right".into(), rgb(0, 0, 0));
        d.insert("bgcolor".into(), rgb(255, 255, 255));
        d.insert("textfont".into(), "Sans Serif".into());
        d.insert("pointsize".into(), AttrValue::Int(10));
        d.insert("fontweight".into(), "normal".into());
        d.insert("fontstyle".into(), "normal".into());
        d.insert("textcolor".into(), rgb(0, 0, 0));
        d.insert("underline".into(), false.into());
        d.insert("strikethrough".into(), false.into());
        d.insert("locked".into(), false.into());
        d.insert("angle".into(), AttrValue::Float(0.0));
        d.insert("column-width".into(), AttrValue::Float(100.0));
        d.insert("row-height".into(), AttrValue::Float(30.0));
        d.insert("vertical_align".into(), "align_top".into());
        d.insert("justification".into(), "justify_left".into());
        d.insert("frozen".into(), false.into());
        d.insert("merge_area".into(), AttrValue::None);
        d.insert("renderer".into(), "text".into());
        d.insert("button_cell".into(), false.into());
        d.insert("panel_cell".into(), false.into());
        d.insert("videovolume".into(), AttrValue::None);
        d
    })
}

/// One attribute assignment: `attrs` apply to `selection` in `table`.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrEntry {
    pub selection: Selection,
    pub table: usize,
    pub attrs: AttrDict,
}

impl AttrEntry {
    pub fn new(selection: Selection, table: usize, attrs: AttrDict) -> AttrEntry {
        AttrEntry {
            selection,
            table,
            attrs,
        }
    }
}

#[derive(Default)]
struct Lookups {
    /// Resolved attributes with the entry count they were resolved against.
    resolved: HashMap<Key, (usize, Arc<AttrDict>)>,
    /// Entry positions per table, valid for `indexed_len` entries.
    by_table: HashMap<usize, Vec<usize>>,
    indexed_len: usize,
}

/// The ordered attribute list with memoized per-cell lookups.
#[derive(Default)]
pub struct CellAttributes {
    entries: Vec<AttrEntry>,
    lookups: Mutex<Lookups>,
}

impl Clone for CellAttributes {
    fn clone(&self) -> Self {
        CellAttributes::from_entries(self.entries.clone())
    }
}

impl PartialEq for CellAttributes {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for CellAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

impl CellAttributes {
    pub fn new() -> CellAttributes {
        CellAttributes::default()
    }

    pub fn from_entries(entries: Vec<AttrEntry>) -> CellAttributes {
        CellAttributes {
            entries,
            lookups: Mutex::new(Lookups::default()),
        }
    }

    pub fn entries(&self) -> &[AttrEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookups(&self) -> std::sync::MutexGuard<'_, Lookups> {
        self.lookups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_lookups(&mut self) {
        *self
            .lookups
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = Lookups::default();
    }

    /// Append an entry. Memoized lookups resolved before the append are
    /// recomputed on next access.
    pub fn append(&mut self, entry: AttrEntry) {
        self.entries.push(entry);
    }

    /// Append an entry and record it in `journal`, so undo pops it again.
    pub fn undoable_append(&mut self, entry: AttrEntry, journal: &mut UndoRedo) {
        journal.record(Op::AppendAttr {
            entry: entry.clone(),
        });
        self.append(entry);
    }

    /// Remove and return the last entry.
    pub fn pop(&mut self) -> Option<AttrEntry> {
        let entry = self.entries.pop();
        self.reset_lookups();
        entry
    }

    /// Replace the whole list, returning the previous one.
    pub fn replace(&mut self, entries: Vec<AttrEntry>) -> Vec<AttrEntry> {
        let prev = std::mem::replace(&mut self.entries, entries);
        self.reset_lookups();
        prev
    }

    /// Entries that apply to `table`, in list order.
    pub fn for_table(&self, table: usize) -> Vec<&AttrEntry> {
        self.entries.iter().filter(|e| e.table == table).collect()
    }

    /// Resolved attributes of `key`.
    pub fn get(&self, key: Key) -> Arc<AttrDict> {
        let len = self.entries.len();
        let mut lookups = self.lookups();
        if let Some((resolved_at, dict)) = lookups.resolved.get(&key)
            && *resolved_at == len
        {
            return dict.clone();
        }

        if lookups.indexed_len != len || (len > 0 && lookups.by_table.is_empty()) {
            let mut by_table: HashMap<usize, Vec<usize>> = HashMap::new();
            for (i, entry) in self.entries.iter().enumerate() {
                by_table.entry(entry.table).or_default().push(i);
            }
            lookups.by_table = by_table;
            lookups.indexed_len = len;
        }

        let mut merged = default_attributes().clone();
        if let Some(positions) = lookups.by_table.get(&key.table) {
            for &i in positions {
                let entry = &self.entries[i];
                if entry.selection.contains(key.row, key.col) {
                    for (name, value) in &entry.attrs {
                        merged.insert(name.clone(), value.clone());
                    }
                }
            }
        }
        let merged = Arc::new(merged);
        lookups.resolved.insert(key, (len, merged.clone()));
        merged
    }

    /// Resolved value of one attribute.
    pub fn get_attr(&self, key: Key, name: &str) -> AttrValue {
        self.get(key).get(name).cloned().unwrap_or(AttrValue::None)
    }

    pub fn is_frozen(&self, key: Key) -> bool {
        self.get_attr(key, "frozen").as_bool().unwrap_or(false)
    }

    /// Top-left cell of the merge area covering `key`, if any.
    pub fn get_merging_cell(&self, key: Key) -> Option<Key> {
        let (top, left, bottom, right) = self.get_attr(key, "merge_area").as_merge_area()?;
        let inside = (top..=bottom).contains(&key.row) && (left..=right).contains(&key.col);
        inside.then_some(Key::new(top, left, key.table))
    }

    /// Entry list after inserting (`n > 0`) or deleting (`n < 0`) `|n|`
    /// rows, columns or tables at `point` along `axis`.
    ///
    /// Row and column shifts touch entries of `table` only (all tables when
    /// `None`). Merge areas are recomputed from their entry's single block
    /// and become `None` once the block is gone or leaves `shape`, the grid
    /// shape after the edit.
    pub fn shifted(
        &self,
        point: usize,
        n: i64,
        axis: usize,
        table: Option<usize>,
        shape: Shape,
    ) -> Vec<AttrEntry> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if axis == 2 {
                let t = entry.table as i64;
                let p = point as i64;
                if t < p {
                    out.push(entry.clone());
                } else if n > 0 {
                    out.push(AttrEntry {
                        table: (t + n) as usize,
                        ..entry.clone()
                    });
                } else if t >= p - n {
                    out.push(AttrEntry {
                        table: (t + n) as usize,
                        ..entry.clone()
                    });
                }
                continue;
            }

            if table.is_some_and(|t| t != entry.table) {
                out.push(entry.clone());
                continue;
            }

            let mut selection = entry.selection.clone();
            selection.insert(point as i64 - 1, n, axis);
            if selection.is_empty() && !entry.selection.is_empty() {
                continue;
            }

            let mut attrs = entry.attrs.clone();
            if let Some(value) = attrs.get_mut("merge_area")
                && !value.is_none()
            {
                *value = match selection.single_block() {
                    Some(((top, left), (bottom, right)))
                        if bottom < shape.rows && right < shape.cols =>
                    {
                        AttrValue::merge_area(top, left, bottom, right)
                    }
                    _ => AttrValue::None,
                };
            }
            out.push(AttrEntry {
                selection,
                table: entry.table,
                attrs,
            });
        }
        out
    }
}
