//! Two-dimensional selections of a table.
//!
//! A selection is the union of rectangular blocks, whole rows, whole columns
//! and single cells. `None` bounds of a block are not representable here:
//! blocks carry concrete inclusive corners.

use std::collections::BTreeSet;
use std::fmt;

/// An inclusive `(row, col)` rectangle.
pub type Block = ((usize, usize), (usize, usize));

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    blocks: Vec<Block>,
    rows: BTreeSet<usize>,
    cols: BTreeSet<usize>,
    cells: BTreeSet<(usize, usize)>,
}

/// Where an index on the shifted axis ends up. Indices inside a deleted band
/// are gone.
fn shift_point(x: usize, point: i64, n: i64) -> Option<usize> {
    let x = x as i64;
    if x <= point {
        Some(x as usize)
    } else if n >= 0 || x > point - n {
        Some((x + n) as usize)
    } else {
        None
    }
}

impl Selection {
    /// Build a selection from parallel top-left / bottom-right corner lists.
    /// Extra corners without a partner are ignored.
    pub fn new(
        block_tl: Vec<(usize, usize)>,
        block_br: Vec<(usize, usize)>,
        rows: impl IntoIterator<Item = usize>,
        cols: impl IntoIterator<Item = usize>,
        cells: impl IntoIterator<Item = (usize, usize)>,
    ) -> Selection {
        Selection {
            blocks: block_tl.into_iter().zip(block_br).collect(),
            rows: rows.into_iter().collect(),
            cols: cols.into_iter().collect(),
            cells: cells.into_iter().collect(),
        }
    }

    pub fn block(top_left: (usize, usize), bottom_right: (usize, usize)) -> Selection {
        Selection {
            blocks: vec![(top_left, bottom_right)],
            ..Selection::default()
        }
    }

    pub fn cell(row: usize, col: usize) -> Selection {
        Selection::new(vec![], vec![], [], [], [(row, col)])
    }

    pub fn rows(rows: impl IntoIterator<Item = usize>) -> Selection {
        Selection::new(vec![], vec![], rows, [], [])
    }

    pub fn cols(cols: impl IntoIterator<Item = usize>) -> Selection {
        Selection::new(vec![], vec![], [], cols, [])
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_tl(&self) -> Vec<(usize, usize)> {
        self.blocks.iter().map(|(tl, _)| *tl).collect()
    }

    pub fn block_br(&self) -> Vec<(usize, usize)> {
        self.blocks.iter().map(|(_, br)| *br).collect()
    }

    pub fn selected_rows(&self) -> &BTreeSet<usize> {
        &self.rows
    }

    pub fn selected_cols(&self) -> &BTreeSet<usize> {
        &self.cols
    }

    pub fn selected_cells(&self) -> &BTreeSet<(usize, usize)> {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
            && self.rows.is_empty()
            && self.cols.is_empty()
            && self.cells.is_empty()
    }

    /// True iff `(row, col)` is covered by any part of the selection.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.blocks
            .iter()
            .any(|&((top, left), (bottom, right))| {
                top <= row && row <= bottom && left <= col && col <= right
            })
            || self.rows.contains(&row)
            || self.cols.contains(&col)
            || self.cells.contains(&(row, col))
    }

    /// The only block, when the selection is exactly one block.
    pub fn single_block(&self) -> Option<Block> {
        let only_block = self.rows.is_empty() && self.cols.is_empty() && self.cells.is_empty();
        match self.blocks.as_slice() {
            [block] if only_block => Some(*block),
            _ => None,
        }
    }

    /// Shift every index greater than `point` along `axis` (0 = rows,
    /// 1 = cols) by `n`.
    ///
    /// With negative `n` the band `point+1 ..= point-n` is removed: rows,
    /// columns and cells inside it are dropped and blocks are clipped to the
    /// surviving range, or dropped when nothing of them survives. Other axes
    /// are left alone.
    pub fn insert(&mut self, point: i64, n: i64, axis: usize) {
        if axis > 1 || n == 0 {
            return;
        }
        let band_start = point + 1;
        let band_end = point - n;

        let mut blocks = Vec::with_capacity(self.blocks.len());
        for &(tl, br) in &self.blocks {
            let (lo, hi) = if axis == 0 { (tl.0, br.0) } else { (tl.1, br.1) };
            let (lo, hi) = if n > 0 {
                (shift_point(lo, point, n), shift_point(hi, point, n))
            } else {
                let lo_in_band = (lo as i64) >= band_start && (lo as i64) <= band_end;
                let hi_in_band = (hi as i64) >= band_start && (hi as i64) <= band_end;
                let lo = if lo_in_band {
                    Some(band_start as usize)
                } else {
                    shift_point(lo, point, n)
                };
                let hi = if hi_in_band {
                    (point >= 0).then_some(point as usize)
                } else {
                    shift_point(hi, point, n)
                };
                (lo, hi)
            };
            let (Some(lo), Some(hi)) = (lo, hi) else {
                continue;
            };
            if lo > hi {
                continue;
            }
            if axis == 0 {
                blocks.push(((lo, tl.1), (hi, br.1)));
            } else {
                blocks.push(((tl.0, lo), (br.0, hi)));
            }
        }
        self.blocks = blocks;

        let shifted = |set: &BTreeSet<usize>| -> BTreeSet<usize> {
            set.iter().filter_map(|&x| shift_point(x, point, n)).collect()
        };
        if axis == 0 {
            self.rows = shifted(&self.rows);
        } else {
            self.cols = shifted(&self.cols);
        }
        self.cells = self
            .cells
            .iter()
            .filter_map(|&(r, c)| {
                if axis == 0 {
                    shift_point(r, point, n).map(|r| (r, c))
                } else {
                    shift_point(c, point, n).map(|c| (r, c))
                }
            })
            .collect();
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn pairs(items: impl Iterator<Item = (usize, usize)>) -> String {
            let parts: Vec<String> = items.map(|(a, b)| format!("({}, {})", a, b)).collect();
            format!("[{}]", parts.join(", "))
        }
        fn singles(items: &BTreeSet<usize>) -> String {
            let parts: Vec<String> = items.iter().map(|x| x.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        write!(
            f,
            "Selection({}, {}, {}, {}, {})",
            pairs(self.blocks.iter().map(|(tl, _)| *tl)),
            pairs(self.blocks.iter().map(|(_, br)| *br)),
            singles(&self.rows),
            singles(&self.cols),
            pairs(self.cells.iter().copied()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_each_part() {
        let sel = Selection::new(vec![(1, 1)], vec![(2, 3)], [5], [7], [(0, 0)]);
        assert!(sel.contains(2, 3));
        assert!(!sel.contains(3, 3));
        assert!(sel.contains(5, 99));
        assert!(sel.contains(99, 7));
        assert!(sel.contains(0, 0));
        assert!(!sel.contains(0, 1));
        assert!(!Selection::default().contains(0, 0));
    }

    #[test]
    fn test_insert_rows_shifts_after_point() {
        let mut sel = Selection::new(vec![(2, 0)], vec![(4, 1)], [1, 3], [], [(3, 3)]);
        sel.insert(2, 2, 0);
        assert_eq!(sel.blocks(), &[((2, 0), (6, 1))]);
        assert_eq!(sel.selected_rows().iter().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert!(sel.selected_cells().contains(&(5, 3)));
    }

    #[test]
    fn test_insert_cols_leaves_rows() {
        let mut sel = Selection::new(vec![], vec![], [4], [4], [(4, 4)]);
        sel.insert(0, 1, 1);
        assert!(sel.selected_rows().contains(&4));
        assert!(sel.selected_cols().contains(&5));
        assert!(sel.selected_cells().contains(&(4, 5)));
    }

    #[test]
    fn test_negative_insert_removes_band() {
        // Delete rows 1 and 2.
        let mut sel = Selection::new(vec![(2, 0)], vec![(5, 0)], [1, 2, 6], [], [(2, 0), (3, 0)]);
        sel.insert(0, -2, 0);
        assert_eq!(sel.blocks(), &[((1, 0), (3, 0))]);
        assert_eq!(sel.selected_rows().iter().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(
            sel.selected_cells().iter().copied().collect::<Vec<_>>(),
            vec![(1, 0)]
        );
    }

    #[test]
    fn test_negative_insert_drops_block_inside_band() {
        let mut sel = Selection::block((2, 0), (3, 1));
        sel.insert(1, -3, 0);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_display_literal() {
        let sel = Selection::new(vec![(0, 0)], vec![(1, 2)], [3], [], [(4, 5)]);
        assert_eq!(
            sel.to_string(),
            "Selection([(0, 0)], [(1, 2)], [3], [], [(4, 5)])"
        );
    }
}
