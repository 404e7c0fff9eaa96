//! Model settings.
//!
//! Every field has a default so a partial `config.toml` works.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use codesheet_engine::engine::Shape;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Evaluation timeout in seconds.
    pub timeout: f64,
    pub default_row_height: f64,
    pub default_col_width: f64,
    /// Number of undo steps kept.
    pub max_unredo: usize,
    /// Shape of a new grid as `[rows, cols, tables]`.
    pub shape: [usize; 3],
    /// Longest evaluated result text considered by searches.
    pub max_result_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timeout: 10.0,
            default_row_height: 30.0,
            default_col_width: 100.0,
            max_unredo: 5000,
            shape: [1000, 100, 3],
            max_result_length: 1000,
        }
    }
}

impl Settings {
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::from_secs(10))
    }

    pub fn grid_shape(&self) -> Shape {
        let [rows, cols, tables] = self.shape;
        Shape::new(rows, cols, tables)
    }
}
