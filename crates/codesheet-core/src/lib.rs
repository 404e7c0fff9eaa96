//! codesheet-core - grid model, undo journal, evaluation and storage.

pub mod attributes;
pub mod code_array;
pub mod data_array;
pub mod error;
pub mod grid;
pub mod selection;
pub mod settings;
pub mod storage;
pub mod unredo;

pub use attributes::{AttrDict, AttrEntry, AttrValue, CellAttributes, attr_dict, default_attributes};
pub use code_array::{CodeArray, FindFlags};
pub use data_array::{DataArray, SheetData};
pub use error::{CodesheetError, Result};
pub use grid::{Cells, DictGrid, Nested};
pub use selection::Selection;
pub use settings::Settings;
pub use unredo::{Op, UndoRedo};

pub use codesheet_engine::engine::{
    CellIndex, Dynamic, EvalError, EvalErrorKind, Index, Key, Shape, Slice, format_dynamic,
};
