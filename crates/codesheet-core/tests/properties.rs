// Property-based tests for the grid model.
// CI: 128 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use codesheet_core::{
    AttrEntry, AttrValue, CellAttributes, CellIndex, CodeArray, DataArray, Key, Selection, Shape,
    attr_dict, format_dynamic,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

const SHAPE: Shape = Shape::new(6, 5, 2);

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Edit {
    Set(usize, usize, usize, String),
    Clear(usize, usize, usize),
    Insert(usize, usize, usize),
    Delete(usize, usize, usize),
    InsertIn(usize, usize, usize, usize),
    DeleteIn(usize, usize, usize, usize),
    Resize(usize, usize, usize),
    RowHeight(usize, usize, f64),
    Attr(usize, usize, usize, i64),
    Macros(String),
}

fn arb_code() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"[0-9]{1,3}( \+ [0-9]{1,2})?",
        1 => r"[a-z]{1,6}",
    ]
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (0..20usize, 0..20usize, 0..4usize, arb_code())
            .prop_map(|(r, c, t, code)| Edit::Set(r, c, t, code)),
        1 => (0..20usize, 0..20usize, 0..4usize).prop_map(|(r, c, t)| Edit::Clear(r, c, t)),
        2 => (0..20usize, 1..3usize, 0..3usize).prop_map(|(p, n, a)| Edit::Insert(p, n, a)),
        2 => (0..20usize, 1..3usize, 0..3usize).prop_map(|(p, n, a)| Edit::Delete(p, n, a)),
        1 => (0..20usize, 1..3usize, 0..2usize, 0..4usize)
            .prop_map(|(p, n, a, t)| Edit::InsertIn(p, n, a, t)),
        1 => (0..20usize, 1..3usize, 0..2usize, 0..4usize)
            .prop_map(|(p, n, a, t)| Edit::DeleteIn(p, n, a, t)),
        1 => (1..8usize, 1..8usize, 1..4usize).prop_map(|(r, c, t)| Edit::Resize(r, c, t)),
        1 => (0..20usize, 0..4usize, 1.0..90.0f64).prop_map(|(r, t, h)| Edit::RowHeight(r, t, h)),
        1 => (0..20usize, 0..20usize, 0..4usize, 0..100i64)
            .prop_map(|(r, c, t, v)| Edit::Attr(r, c, t, v)),
        1 => r"(fn [a-z]{1,4}\(\) \{ [0-9] \})?".prop_map(Edit::Macros),
    ]
}

/// Apply `edit` with coordinates folded into the current shape. Edits the
/// model rejects are skipped.
fn apply(da: &mut DataArray, edit: &Edit) {
    let shape = da.shape();
    let key = |r: usize, c: usize, t: usize| {
        Key::new(r % shape.rows, c % shape.cols, t % shape.tables)
    };
    let size = |axis: usize| shape.get(axis).unwrap_or(1);
    let _ = match edit {
        Edit::Set(r, c, t, code) => da
            .set(&CellIndex::from(key(*r, *c, *t)), Some(code), true)
            .map(drop),
        Edit::Clear(r, c, t) => da.clear_cell(&CellIndex::from(key(*r, *c, *t)), true).map(drop),
        Edit::Insert(p, n, axis) => {
            let point = (p % (size(*axis) + 1)) as i64;
            da.insert(point, *n as i64, *axis, None, true)
        }
        Edit::Delete(p, n, axis) => {
            let point = (p % size(*axis)) as i64;
            da.delete(point, *n as i64, *axis, None, true)
        }
        Edit::InsertIn(p, n, axis, t) => {
            let point = (p % (size(*axis) + 1)) as i64;
            da.insert(point, *n as i64, *axis, Some(t % shape.tables), true)
        }
        Edit::DeleteIn(p, n, axis, t) => {
            let point = (p % size(*axis)) as i64;
            da.delete(point, *n as i64, *axis, Some(t % shape.tables), true)
        }
        Edit::Resize(r, c, t) => da.set_shape(Shape::new(*r, *c, *t), true),
        Edit::RowHeight(r, t, h) => da.set_row_height(r % shape.rows, t % shape.tables, *h, true),
        Edit::Attr(r, c, t, v) => {
            let k = key(*r, *c, *t);
            da.append_attributes(
                Selection::block((k.row, k.col), (k.row, k.col)),
                k.table,
                attr_dict([("tag", *v)]),
                true,
            )
        }
        Edit::Macros(text) => {
            da.set_macros(text, true);
            Ok(())
        }
    };
}

fn arb_filled() -> impl Strategy<Value = Vec<(usize, usize, usize, String)>> {
    prop::collection::vec((0..6usize, 0..5usize, 0..2usize, arb_code()), 0..15)
}

fn filled_array(cells: &[(usize, usize, usize, String)]) -> DataArray {
    let mut da = DataArray::new(SHAPE);
    for (r, c, t, code) in cells {
        da.set(&CellIndex::from(Key::new(*r, *c, *t)), Some(code), false)
            .unwrap();
        da.append_attributes(Selection::cell(*r, *c), *t, attr_dict([("tag", code.as_str())]), false)
            .unwrap();
    }
    da.mark();
    da
}

/// Edits on an evaluated sheet, interleaved with reads that fill the cache.
#[derive(Clone, Debug)]
enum SheetEdit {
    Set(usize, usize, usize, String),
    Clear(usize, usize, usize),
    Insert(usize, usize, usize, Option<usize>),
    Delete(usize, usize, usize, Option<usize>),
    Undo,
    Redo,
    Read(usize, usize, usize),
}

/// Cell code that only reads cells above it, so evaluation order never
/// matters.
fn arb_formula() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"[1-9][0-9]?",
        1 => Just("SUM(S[0:R, C, T])".to_string()),
        1 => Just("LEN(S[0:R, C, T]) * 10".to_string()),
        1 => Just("MAX(S[0:R, C, T])".to_string()),
    ]
}

fn arb_sheet_edit() -> impl Strategy<Value = SheetEdit> {
    prop_oneof![
        4 => (0..8usize, 0..8usize, 0..3usize, arb_formula())
            .prop_map(|(r, c, t, code)| SheetEdit::Set(r, c, t, code)),
        1 => (0..8usize, 0..8usize, 0..3usize).prop_map(|(r, c, t)| SheetEdit::Clear(r, c, t)),
        1 => (0..8usize, 1..3usize, 0..3usize, prop::option::of(0..3usize))
            .prop_map(|(p, n, a, t)| SheetEdit::Insert(p, n, a, t)),
        1 => (0..8usize, 1..3usize, 0..3usize, prop::option::of(0..3usize))
            .prop_map(|(p, n, a, t)| SheetEdit::Delete(p, n, a, t)),
        1 => Just(SheetEdit::Undo),
        1 => Just(SheetEdit::Redo),
        4 => (0..8usize, 0..8usize, 0..3usize).prop_map(|(r, c, t)| SheetEdit::Read(r, c, t)),
    ]
}

/// Axis length past which inserts are skipped, keeping reference chains short.
const MAX_AXIS: usize = 8;

fn apply_sheet(ca: &mut CodeArray, edit: &SheetEdit) {
    let shape = ca.shape();
    let key = |r: usize, c: usize, t: usize| {
        Key::new(r % shape.rows, c % shape.cols, t % shape.tables)
    };
    let size = |axis: usize| shape.get(axis).unwrap_or(1);
    let _ = match edit {
        SheetEdit::Set(r, c, t, code) => ca
            .set(&CellIndex::from(key(*r, *c, *t)), Some(code), true)
            .map(drop),
        SheetEdit::Clear(r, c, t) => ca.clear_cell(&CellIndex::from(key(*r, *c, *t)), true).map(drop),
        SheetEdit::Insert(p, n, axis, table) => {
            if size(*axis) >= MAX_AXIS {
                return;
            }
            let point = (p % (size(*axis) + 1)) as i64;
            ca.insert(point, *n as i64, *axis, table.map(|t| t % shape.tables), true)
        }
        SheetEdit::Delete(p, n, axis, table) => {
            let point = (p % size(*axis)) as i64;
            ca.delete(point, *n as i64, *axis, table.map(|t| t % shape.tables), true)
        }
        SheetEdit::Undo => ca.undo(),
        SheetEdit::Redo => ca.redo(),
        SheetEdit::Read(r, c, t) => {
            ca.value(key(*r, *c, *t));
            Ok(())
        }
    };
}

fn arb_selection() -> impl Strategy<Value = Selection> {
    (
        prop::collection::vec((0..10usize, 0..10usize, 0..10usize, 0..10usize), 0..3),
        prop::collection::vec(0..10usize, 0..3),
        prop::collection::vec(0..10usize, 0..3),
        prop::collection::vec((0..10usize, 0..10usize), 0..6),
    )
        .prop_map(|(blocks, rows, cols, cells)| {
            let (top_left, bottom_right): (Vec<_>, Vec<_>) = blocks
                .iter()
                .map(|&(r0, c0, r1, c1)| ((r0.min(r1), c0.min(c1)), (r0.max(r1), c0.max(c1))))
                .unzip();
            Selection::new(top_left, bottom_right, rows, cols, cells)
        })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn keys_stay_inside_shape(edits in prop::collection::vec(arb_edit(), 1..30)) {
        let mut da = DataArray::new(SHAPE);
        for edit in &edits {
            apply(&mut da, edit);
            let shape = da.shape();
            prop_assert!(shape.is_valid());
            for key in da.keys() {
                prop_assert!(shape.contains(&key), "{} outside {}", key, shape);
            }
        }
    }

    #[test]
    fn undo_all_restores_and_redo_all_replays(edits in prop::collection::vec(arb_edit(), 1..25)) {
        let mut da = DataArray::new(SHAPE);
        let initial = da.data();
        for edit in &edits {
            apply(&mut da, edit);
        }
        let last = da.data();

        while da.can_undo() {
            da.undo().unwrap();
        }
        prop_assert_eq!(da.data(), initial);

        while da.can_redo() {
            da.redo().unwrap();
        }
        prop_assert_eq!(da.data(), last);
    }

    #[test]
    fn insert_then_delete_is_identity(
        cells in arb_filled(),
        point in 0..7usize,
        n in 1..4usize,
        axis in 0..3usize,
    ) {
        let mut da = filled_array(&cells);
        let before = da.data();
        let point = point.min(SHAPE.get(axis).unwrap_or(0)) as i64;

        da.insert(point, n as i64, axis, None, true).unwrap();
        da.delete(point, n as i64, axis, None, true).unwrap();
        prop_assert_eq!(da.data(), before);
    }

    #[test]
    fn later_entries_override_earlier(
        entries in prop::collection::vec((0..4usize, 0..4usize, 0..4usize, 0..4usize, 0..50i64), 0..12),
        row in 0..4usize,
        col in 0..4usize,
    ) {
        let mut attributes = CellAttributes::new();
        let mut expected = AttrValue::None;
        for &(r0, c0, r1, c1, v) in &entries {
            let (top, bottom) = (r0.min(r1), r0.max(r1));
            let (left, right) = (c0.min(c1), c0.max(c1));
            let selection = Selection::block((top, left), (bottom, right));
            if selection.contains(row, col) {
                expected = AttrValue::Int(v);
            }
            attributes.append(AttrEntry::new(selection, 0, attr_dict([("tag", v)])));
        }
        prop_assert_eq!(attributes.get_attr(Key::new(row, col, 0), "tag"), expected);
        prop_assert_eq!(attributes.get_attr(Key::new(row, col, 1), "tag"), AttrValue::None);
    }

    #[test]
    fn cached_values_match_fresh_evaluation(
        edits in prop::collection::vec(arb_sheet_edit(), 1..30),
    ) {
        let mut ca = CodeArray::new(Shape::new(4, 3, 2));
        for edit in &edits {
            apply_sheet(&mut ca, edit);
        }
        let mut fresh = CodeArray::new(Shape::new(1, 1, 1));
        fresh.set_data(ca.data()).unwrap();

        let shape = ca.shape();
        for table in 0..shape.tables {
            for row in 0..shape.rows {
                for col in 0..shape.cols {
                    let key = Key::new(row, col, table);
                    prop_assert_eq!(
                        format_dynamic(&ca.value(key)),
                        format_dynamic(&fresh.value(key)),
                        "cell {}", key
                    );
                }
            }
        }
    }

    #[test]
    fn selection_follows_insert_and_delete(
        selection in arb_selection(),
        point in 0..10i64,
        n in prop_oneof![-3..=-1i64, 1..=3i64],
        axis in 0..2usize,
    ) {
        let mut shifted = selection.clone();
        shifted.insert(point, n, axis);
        // Where an index lands; `None` inside a deleted band.
        let moved = |x: usize| -> Option<usize> {
            let x = x as i64;
            if x <= point {
                Some(x as usize)
            } else if n < 0 && x <= point - n {
                None
            } else {
                Some((x + n) as usize)
            }
        };
        for r in 0..10usize {
            for c in 0..10usize {
                let along = if axis == 0 { r } else { c };
                let Some(m) = moved(along) else {
                    continue;
                };
                let (nr, nc) = if axis == 0 { (m, c) } else { (r, m) };
                prop_assert_eq!(
                    selection.contains(r, c),
                    shifted.contains(nr, nc),
                    "({}, {}) -> ({}, {})", r, c, nr, nc
                );
            }
        }
    }
}
