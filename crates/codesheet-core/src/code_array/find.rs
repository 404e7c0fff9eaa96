//! Text search over cell code and results.

use std::ops::{BitOr, BitOrAssign};

use codesheet_engine::engine::{Key, format_truncated};
use regex::Regex;

use super::CodeArray;
use crate::error::{CodesheetError, Result};

/// Search options. Exactly one of `UP` and `DOWN` must be set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FindFlags(u8);

impl FindFlags {
    pub const UP: FindFlags = FindFlags(1);
    pub const DOWN: FindFlags = FindFlags(1 << 1);
    pub const MATCH_CASE: FindFlags = FindFlags(1 << 2);
    pub const WHOLE_WORD: FindFlags = FindFlags(1 << 3);
    pub const REG_EXP: FindFlags = FindFlags(1 << 4);

    pub const fn empty() -> FindFlags {
        FindFlags(0)
    }

    pub const fn contains(self, other: FindFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FindFlags {
    type Output = FindFlags;

    fn bitor(self, rhs: FindFlags) -> FindFlags {
        FindFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FindFlags {
    fn bitor_assign(&mut self, rhs: FindFlags) {
        self.0 |= rhs.0;
    }
}

enum Matcher {
    Pattern(Regex),
    Substring { needle: String, match_case: bool },
}

impl Matcher {
    fn new(needle: &str, flags: FindFlags) -> Result<Matcher> {
        let match_case = flags.contains(FindFlags::MATCH_CASE);
        let pattern = if flags.contains(FindFlags::REG_EXP) {
            needle.to_string()
        } else if flags.contains(FindFlags::WHOLE_WORD) {
            format!(r"\b{}\b", regex::escape(needle))
        } else {
            let needle = if match_case {
                needle.to_string()
            } else {
                needle.to_lowercase()
            };
            return Ok(Matcher::Substring { needle, match_case });
        };
        let pattern = if match_case {
            pattern
        } else {
            format!("(?i){}", pattern)
        };
        Ok(Matcher::Pattern(Regex::new(&pattern)?))
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Pattern(re) => re.is_match(text),
            Matcher::Substring {
                needle,
                match_case: true,
            } => text.contains(needle.as_str()),
            Matcher::Substring { needle, .. } => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

impl CodeArray {
    /// First cell after `start` whose code (or, with `include_results`, whose
    /// evaluated result) matches `needle`.
    ///
    /// Cells are visited table by table, then column by column, then row by
    /// row, wrapping around; `UP` walks that order backwards.
    pub fn find_next(
        &self,
        start: Key,
        needle: &str,
        flags: FindFlags,
        include_results: bool,
    ) -> Result<Option<Key>> {
        let up = flags.contains(FindFlags::UP);
        if up == flags.contains(FindFlags::DOWN) {
            return Err(CodesheetError::Unsupported(
                "find needs exactly one of UP and DOWN".to_string(),
            ));
        }
        let matcher = Matcher::new(needle, flags)?;
        let max_len = self.with_data(|d| d.settings().max_result_length);

        let mut keys = self.with_data(|d| d.keys());
        keys.sort_by_key(Key::search_order);
        if up {
            keys.reverse();
        }
        let origin = start.search_order();
        let (after, before): (Vec<Key>, Vec<Key>) = keys.into_iter().partition(|k| {
            if up {
                k.search_order() < origin
            } else {
                k.search_order() > origin
            }
        });

        for key in after.into_iter().chain(before) {
            if self.code(key).is_some_and(|code| matcher.is_match(&code)) {
                return Ok(Some(key));
            }
            if include_results && matcher.is_match(&format_truncated(&self.value(key), max_len)) {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }
}
