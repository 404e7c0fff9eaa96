//! codesheet_engine - Rhai evaluation engine for code cells.

pub(crate) mod builtins;
pub mod engine;

#[cfg(test)]
mod tests {
    use crate::engine::*;
    use rhai::{Engine, EvalAltResult};
    use std::sync::Arc;

    /// A one-cell grid whose cell holds `code`.
    struct OneCell {
        code: String,
    }

    impl CellSource for OneCell {
        fn value(&self, engine: &Engine, index: CellIndex) -> Result<Dynamic, Box<EvalAltResult>> {
            match index.as_key() {
                Some(key) if key == Key::default() => {
                    eval_cell(engine, &mut Scope::new(), &self.code)
                }
                _ => Ok(Dynamic::UNIT),
            }
        }
        fn code(&self, key: Key) -> Option<String> {
            (key == Key::default()).then(|| self.code.clone())
        }
        fn shape(&self) -> Shape {
            Shape::new(1, 1, 1)
        }
        fn set_code(&self, _: Key, _: Option<String>) -> Result<(), String> {
            Err("read-only".to_string())
        }
    }

    #[test]
    fn test_subscript_reads_through_engine() {
        let source: Arc<dyn CellSource> = Arc::new(OneCell {
            code: "20 + 1".to_string(),
        });
        let engine = create_engine(source.clone(), &Watchdog::new());
        let mut scope = Scope::new();
        scope.push_constant("S", SheetRef::new(&source));

        let v = eval_cell(&engine, &mut scope, "S[0, 0, 0] * 2").unwrap();
        assert_eq!(v.as_int().unwrap(), 42);

        let code = eval_cell(&engine, &mut scope, "S.code(0, 0, 0)").unwrap();
        assert_eq!(code.into_string().unwrap(), "20 + 1");

        let shape = eval_cell(&engine, &mut scope, "S.shape").unwrap();
        assert_eq!(shape.into_array().unwrap().len(), 3);
    }

    #[test]
    fn test_error_values_flow_into_dependents() {
        let source: Arc<dyn CellSource> = Arc::new(OneCell {
            code: "ERROR(\"bad input\")".to_string(),
        });
        let engine = create_engine(source, &Watchdog::new());
        let v = eval_cell(&engine, &mut Scope::new(), "IS_ERROR(S[0, 0, 0])").unwrap();
        assert!(v.as_bool().unwrap());
    }
}
