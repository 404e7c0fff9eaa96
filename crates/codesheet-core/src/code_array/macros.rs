//! Macro execution.
//!
//! Macros run with write access to the grid (`SET_CELL`, `CLEAR_CELL`).
//! Variables they leave behind become shared globals, and the functions they
//! define can be called from cell code.

use codesheet_engine::engine::{MacroOutput, compile_cell, create_script_engine, traceback};

use super::CodeArray;

impl CodeArray {
    /// Run the macro text and return what it printed as `(out, err)`.
    ///
    /// Failures never propagate: their traceback is appended to `err`. Cells
    /// written by the macro form one undo step. Both caches are cleared
    /// afterwards.
    pub fn execute_macros(&mut self) -> (String, String) {
        let code = self.macros();
        let output = MacroOutput::default();
        let engine = create_script_engine(self.sheet.clone(), &self.sheet.watchdog, output.clone());
        let limit = self.with_data(|d| d.settings().timeout_duration());

        let result = {
            let _guard = self.sheet.watchdog.arm(limit);
            let mut scope = self.sheet.globals().clone();
            if let Some(sheet) = self.sheet.sheet_ref() {
                scope.push_constant("S", sheet);
            }
            compile_cell(&engine, &code).and_then(|ast| {
                engine.run_ast_with_scope(&mut scope, &ast)?;
                Ok((ast, scope))
            })
        };

        match result {
            Ok((ast, scope)) => {
                self.sheet.merge_globals(&scope);
                let functions = ast.clone_functions_only();
                let defined = functions.iter_functions().count();
                self.sheet
                    .set_functions((defined > 0).then_some(functions));
                tracing::debug!(functions = defined, "macros executed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "macro execution failed");
                output.write_err(&traceback(&err));
            }
        }

        self.mark();
        self.sheet.clear_caches();
        output.take()
    }
}
