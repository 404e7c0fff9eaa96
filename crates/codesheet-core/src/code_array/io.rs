use std::path::Path;

use super::CodeArray;
use crate::error::Result;
use crate::storage::{parse_sheet, parse_sheet_content, write_sheet, write_sheet_content};

impl CodeArray {
    /// Load a save file, replacing everything stored. With `safe_mode` the
    /// loaded code is not evaluated until [`CodeArray::approve`].
    pub fn load_file(&mut self, path: &Path, safe_mode: bool) -> Result<()> {
        let data = parse_sheet(path)?;
        let cells = data.grid.len();
        self.set_data(data)?;
        self.set_safe_mode(safe_mode);
        tracing::info!(path = %path.display(), cells, safe_mode, "loaded sheet");
        Ok(())
    }

    pub fn save_file(&self, path: &Path) -> Result<()> {
        let data = self.data();
        write_sheet(path, &data)?;
        tracing::info!(path = %path.display(), cells = data.grid.len(), "saved sheet");
        Ok(())
    }

    /// Load save file content from a string.
    pub fn load_str(&mut self, content: &str, safe_mode: bool) -> Result<()> {
        let data = parse_sheet_content(content)?;
        self.set_data(data)?;
        self.set_safe_mode(safe_mode);
        Ok(())
    }

    pub fn save_string(&self) -> String {
        write_sheet_content(&self.data())
    }
}
