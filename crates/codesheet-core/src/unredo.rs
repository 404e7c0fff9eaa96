//! Undo/redo journal.
//!
//! Every mutation of a [`crate::DataArray`] records an [`Op`] holding both
//! the previous and the new state. A step is the run of ops between two
//! marks; undo reverts one step, redo replays it.

use codesheet_engine::engine::{Key, Shape};

use crate::attributes::AttrEntry;

/// A recorded mutation. Applying [`Op::inverse`] reverts it.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    SetCell {
        key: Key,
        prev: Option<String>,
        new: Option<String>,
    },
    SetShape {
        prev: Shape,
        new: Shape,
    },
    SetRowHeight {
        row: usize,
        table: usize,
        prev: Option<f64>,
        new: Option<f64>,
    },
    SetColWidth {
        col: usize,
        table: usize,
        prev: Option<f64>,
        new: Option<f64>,
    },
    AppendAttr {
        entry: AttrEntry,
    },
    PopAttr {
        entry: AttrEntry,
    },
    ReplaceAttrs {
        prev: Vec<AttrEntry>,
        new: Vec<AttrEntry>,
    },
    SetMacros {
        prev: String,
        new: String,
    },
}

impl Op {
    pub fn inverse(&self) -> Op {
        match self.clone() {
            Op::SetCell { key, prev, new } => Op::SetCell {
                key,
                prev: new,
                new: prev,
            },
            Op::SetShape { prev, new } => Op::SetShape {
                prev: new,
                new: prev,
            },
            Op::SetRowHeight {
                row,
                table,
                prev,
                new,
            } => Op::SetRowHeight {
                row,
                table,
                prev: new,
                new: prev,
            },
            Op::SetColWidth {
                col,
                table,
                prev,
                new,
            } => Op::SetColWidth {
                col,
                table,
                prev: new,
                new: prev,
            },
            Op::AppendAttr { entry } => Op::PopAttr { entry },
            Op::PopAttr { entry } => Op::AppendAttr { entry },
            Op::ReplaceAttrs { prev, new } => Op::ReplaceAttrs {
                prev: new,
                new: prev,
            },
            Op::SetMacros { prev, new } => Op::SetMacros {
                prev: new,
                new: prev,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Entry {
    Op(Op),
    Mark,
}

/// Pop the most recent step (trailing marks stripped), in recording order.
fn pop_group(stack: &mut Vec<Entry>) -> Option<Vec<Op>> {
    while matches!(stack.last(), Some(Entry::Mark)) {
        stack.pop();
    }
    let mut ops = Vec::new();
    while let Some(Entry::Op(_)) = stack.last() {
        if let Some(Entry::Op(op)) = stack.pop() {
            ops.push(op);
        }
    }
    if ops.is_empty() {
        return None;
    }
    ops.reverse();
    Some(ops)
}

fn push_group(stack: &mut Vec<Entry>, ops: Vec<Op>) {
    if matches!(stack.last(), Some(Entry::Op(_))) {
        stack.push(Entry::Mark);
    }
    stack.extend(ops.into_iter().map(Entry::Op));
    stack.push(Entry::Mark);
}

fn count_groups(stack: &[Entry]) -> usize {
    let mut groups = 0;
    let mut in_run = false;
    for entry in stack {
        match entry {
            Entry::Op(_) => in_run = true,
            Entry::Mark => {
                if in_run {
                    groups += 1;
                }
                in_run = false;
            }
        }
    }
    groups + usize::from(in_run)
}

/// Undo and redo stacks with step marks.
#[derive(Clone, Debug)]
pub struct UndoRedo {
    undo: Vec<Entry>,
    redo: Vec<Entry>,
    /// Nesting depth of open transactions. Marks are deferred while open.
    depth: usize,
    max_steps: usize,
    /// Marked steps on the undo stack, kept in step with `undo`.
    closed_steps: usize,
}

/// Maximum number of undo steps kept by default.
pub const DEFAULT_MAX_STEPS: usize = 5000;

impl Default for UndoRedo {
    fn default() -> Self {
        UndoRedo::new(DEFAULT_MAX_STEPS)
    }
}

impl UndoRedo {
    pub fn new(max_steps: usize) -> UndoRedo {
        UndoRedo {
            undo: Vec::new(),
            redo: Vec::new(),
            depth: 0,
            max_steps: max_steps.max(1),
            closed_steps: 0,
        }
    }

    /// Record an applied op. A new op invalidates the redo history.
    pub fn record(&mut self, op: Op) {
        self.undo.push(Entry::Op(op));
        self.redo.clear();
    }

    /// Close the current step. Consecutive marks collapse into one, and
    /// marks inside a transaction are deferred to its end.
    pub fn mark(&mut self) {
        if self.depth > 0 {
            return;
        }
        if self.has_pending_step() {
            self.undo.push(Entry::Mark);
            self.closed_steps += 1;
            self.trim();
        }
    }

    pub fn begin(&mut self) {
        self.depth += 1;
    }

    /// Leave a transaction; the outermost one closes the step.
    pub fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.mark();
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    pub fn can_undo(&self) -> bool {
        self.undo.iter().any(|e| matches!(e, Entry::Op(_)))
    }

    pub fn can_redo(&self) -> bool {
        self.redo.iter().any(|e| matches!(e, Entry::Op(_)))
    }

    /// Number of complete or pending steps on the undo stack.
    pub fn undo_steps(&self) -> usize {
        self.closed_steps + usize::from(self.has_pending_step())
    }

    fn has_pending_step(&self) -> bool {
        matches!(self.undo.last(), Some(Entry::Op(_)))
    }

    pub fn redo_steps(&self) -> usize {
        count_groups(&self.redo)
    }

    /// Take the latest step for undoing. The caller applies the inverses in
    /// reverse order, then hands the step to [`UndoRedo::push_redo`].
    pub(crate) fn pop_undo(&mut self) -> Option<Vec<Op>> {
        let closed = !self.has_pending_step();
        let ops = pop_group(&mut self.undo)?;
        if closed {
            self.closed_steps = self.closed_steps.saturating_sub(1);
        }
        Some(ops)
    }

    pub(crate) fn push_redo(&mut self, ops: Vec<Op>) {
        push_group(&mut self.redo, ops);
    }

    /// Take the latest undone step for replaying.
    pub(crate) fn pop_redo(&mut self) -> Option<Vec<Op>> {
        pop_group(&mut self.redo)
    }

    /// Put a replayed step back without touching the redo stack.
    pub(crate) fn push_undo(&mut self, ops: Vec<Op>) {
        let before = usize::from(self.has_pending_step());
        push_group(&mut self.undo, ops);
        self.closed_steps += before + 1;
        self.trim();
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.depth = 0;
        self.closed_steps = 0;
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps.max(1);
        self.trim();
    }

    /// Drop the oldest steps beyond `max_steps`.
    fn trim(&mut self) {
        let groups = self.undo_steps();
        if groups <= self.max_steps {
            return;
        }
        let dropped = groups - self.max_steps;
        let mut excess = dropped;
        let mut in_run = false;
        let mut cut = 0;
        for (i, entry) in self.undo.iter().enumerate() {
            match entry {
                Entry::Op(_) => in_run = true,
                Entry::Mark if in_run => {
                    in_run = false;
                    excess -= 1;
                    if excess == 0 {
                        cut = i + 1;
                        break;
                    }
                }
                Entry::Mark => {}
            }
        }
        self.undo.drain(..cut);
        self.closed_steps -= dropped;
        tracing::debug!(dropped, "trimmed undo history");
    }
}
