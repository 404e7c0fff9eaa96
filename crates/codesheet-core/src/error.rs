//! Error types for Codesheet core.

use thiserror::Error;

/// Errors that can occur in the Codesheet model
#[derive(Error, Debug)]
pub enum CodesheetError {
    #[error("Index {index} out of bounds for axis {axis} (size {size})")]
    OutOfBounds { axis: usize, index: i64, size: usize },

    #[error("Invalid axis {0}: expected 0, 1 or 2")]
    InvalidAxis(usize),

    #[error("Invalid count: {0}")]
    InvalidCount(String),

    #[error("Invalid size {0}: sizes must be finite and non-negative")]
    InvalidSize(f64),

    #[error("Invalid shape {0}: every extent must be at least 1")]
    InvalidShape(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid literal {text:?}: {message}")]
    Literal { text: String, message: String },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

pub type Result<T> = std::result::Result<T, CodesheetError>;
