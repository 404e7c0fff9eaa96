//! Built-in functions available to cell code.
//!
//! Conventions:
//! - Sheet-facing built-in names are ALL CAPS (e.g. `SUM`, `AVG`).
//! - Grid access goes through `CELL(r, c, t)`, which `S[r, c, t]` rewrites to.
//!   Components are integers, Rhai ranges, or `SLICE(start, stop, step)` values.
//! - Aggregates take arrays (a sliced `S[...]` is a nested array) and skip
//!   empty cells the way `nn` does.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use regex::Regex;
use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, NativeCallContext, Position};

use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use crate::engine::{
    CellIndex, CellSource, EvalError, EvalErrorKind, Index, Key, SheetRef, Slice,
};

fn invalid_arg(message: &str) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(message.into(), Position::NONE).into()
}

fn to_usize(value: i64, label: &str) -> Result<usize, Box<EvalAltResult>> {
    usize::try_from(value).map_err(|_| invalid_arg(&format!("{} must be >= 0", label)))
}

fn to_decimal_places(value: i64) -> Result<usize, Box<EvalAltResult>> {
    const MAX_DECIMALS: usize = 12;
    let places = to_usize(value, "decimals")?;
    if places > MAX_DECIMALS {
        return Err(invalid_arg(&format!(
            "decimals must be <= {}",
            MAX_DECIMALS
        )));
    }
    Ok(places)
}

fn fixed_decimal_string(n: f64, decimals: usize) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Fixed number of decimal places (always prints trailing zeros).
    format!("{:.*}", decimals, n)
}

fn optional_int(value: &Dynamic, label: &str) -> Result<Option<i64>, Box<EvalAltResult>> {
    if value.is_unit() {
        return Ok(None);
    }
    value
        .as_int()
        .map(Some)
        .map_err(|_| invalid_arg(&format!("slice {} must be an integer or ()", label)))
}

/// Interpret a `CELL` argument as an index component.
pub fn index_from_dynamic(value: Dynamic) -> Result<Index, Box<EvalAltResult>> {
    if let Ok(i) = value.as_int() {
        return Ok(Index::At(i));
    }
    if value.is_unit() {
        return Ok(Index::Slice(Slice::full()));
    }
    if value.is::<Slice>() {
        return Ok(Index::Slice(value.cast::<Slice>()));
    }
    if value.is::<Range<i64>>() {
        let r = value.cast::<Range<i64>>();
        return Ok(Index::Slice(Slice::range(r.start, r.end)));
    }
    if value.is::<RangeInclusive<i64>>() {
        let r = value.cast::<RangeInclusive<i64>>();
        return Ok(Index::Slice(Slice::range(*r.start(), *r.end() + 1)));
    }
    if value.is_string() {
        return Ok(Index::Name(value.into_string().unwrap_or_default()));
    }
    Err(invalid_arg(&format!(
        "cell index must be an integer, range or slice, not {}",
        value.type_name()
    )))
}

fn cell_index(r: Dynamic, c: Dynamic, t: Dynamic) -> Result<CellIndex, Box<EvalAltResult>> {
    Ok(CellIndex([
        index_from_dynamic(r)?,
        index_from_dynamic(c)?,
        index_from_dynamic(t)?,
    ]))
}

fn make_slice(start: &Dynamic, stop: &Dynamic, step: &Dynamic) -> Result<Slice, Box<EvalAltResult>> {
    let slice = Slice::new(
        optional_int(start, "start")?,
        optional_int(stop, "stop")?,
        optional_int(step, "step")?,
    );
    if slice.step == Some(0) {
        return Err(invalid_arg("slice step cannot be zero"));
    }
    Ok(slice)
}

/// Number or `None` for values aggregates can add up. Unit (empty cell) and
/// failed cells are skipped.
fn numeric(value: &Dynamic) -> Option<f64> {
    if let Ok(n) = value.as_float() {
        return Some(n);
    }
    if let Ok(n) = value.as_int() {
        return Some(n as f64);
    }
    if let Ok(b) = value.as_bool() {
        return Some(if b { 1.0 } else { 0.0 });
    }
    None
}

/// Flatten nested arrays, dropping empty cells.
fn flatten_nn(items: Array, out: &mut Array) {
    for item in items {
        if item.is_unit() {
            continue;
        }
        if item.is_array() {
            flatten_nn(item.into_array().unwrap_or_default(), out);
        } else {
            out.push(item);
        }
    }
}

fn nn(items: Array) -> Array {
    let mut out = Array::new();
    flatten_nn(items, &mut out);
    out
}

fn numbers(items: Array) -> Vec<f64> {
    nn(items).iter().filter_map(numeric).collect()
}

fn regex_arg(pattern: &str) -> Result<Regex, Box<EvalAltResult>> {
    Regex::new(pattern).map_err(|e| invalid_arg(&format!("invalid regex: {}", e)))
}

fn register_types(engine: &mut Engine) {
    engine
        .register_type_with_name::<Slice>("Slice")
        .register_get("start", |s: &mut Slice| s.start.map(Dynamic::from).unwrap_or(Dynamic::UNIT))
        .register_get("stop", |s: &mut Slice| s.stop.map(Dynamic::from).unwrap_or(Dynamic::UNIT))
        .register_get("step", |s: &mut Slice| s.step.map(Dynamic::from).unwrap_or(Dynamic::UNIT))
        .register_fn("to_string", |s: &mut Slice| s.to_string());

    engine
        .register_type_with_name::<EvalError>("EvalError")
        .register_get("kind", |e: &mut EvalError| e.kind.to_string())
        .register_get("message", |e: &mut EvalError| e.message.clone())
        .register_fn("to_string", |e: &mut EvalError| e.to_string())
        .register_fn("to_debug", |e: &mut EvalError| format!("{:?}", e));

    engine.register_type_with_name::<SheetRef>("Sheet");
}

fn sheet_source(sheet: &SheetRef) -> Result<Arc<dyn CellSource>, Box<EvalAltResult>> {
    sheet
        .source()
        .ok_or_else(|| invalid_arg("the grid is no longer available"))
}

/// Register all built-in functions into the Rhai engine.
pub fn register_builtins(engine: &mut Engine, source: Arc<dyn CellSource>) {
    register_types(engine);

    // CELL(r, c, t): evaluated value at a cell; slices give nested arrays.
    let src_cell = source.clone();
    engine.register_fn(
        "CELL",
        move |ctx: NativeCallContext,
              r: Dynamic,
              c: Dynamic,
              t: Dynamic|
              -> Result<Dynamic, Box<EvalAltResult>> {
            src_cell.value(ctx.engine(), cell_index(r, c, t)?)
        },
    );

    // CELL([r, c, t]): the same with the key as an array.
    let src_cell_arr = source.clone();
    engine.register_fn(
        "CELL",
        move |ctx: NativeCallContext, key: Array| -> Result<Dynamic, Box<EvalAltResult>> {
            let [r, c, t]: [Dynamic; 3] = key
                .try_into()
                .map_err(|_| invalid_arg("cell key must have three components"))?;
            src_cell_arr.value(ctx.engine(), cell_index(r, c, t)?)
        },
    );

    // SLICE(start, stop[, step]); () means "open".
    engine.register_fn(
        "SLICE",
        |start: Dynamic, stop: Dynamic| -> Result<Slice, Box<EvalAltResult>> {
            make_slice(&start, &stop, &Dynamic::UNIT)
        },
    );
    engine.register_fn(
        "SLICE",
        |start: Dynamic, stop: Dynamic, step: Dynamic| -> Result<Slice, Box<EvalAltResult>> {
            make_slice(&start, &stop, &step)
        },
    );

    // S.shape, S.code(r, c, t)
    engine.register_get(
        "shape",
        |sheet: &mut SheetRef| -> Result<Array, Box<EvalAltResult>> {
            let shape = sheet_source(sheet)?.shape();
            Ok(vec![
                Dynamic::from(shape.rows as i64),
                Dynamic::from(shape.cols as i64),
                Dynamic::from(shape.tables as i64),
            ])
        },
    );
    engine.register_fn(
        "code",
        |sheet: &mut SheetRef, r: i64, c: i64, t: i64| -> Result<Dynamic, Box<EvalAltResult>> {
            let key = Key::new(to_usize(r, "row")?, to_usize(c, "col")?, to_usize(t, "table")?);
            Ok(sheet_source(sheet)?
                .code(key)
                .map(Dynamic::from)
                .unwrap_or(Dynamic::UNIT))
        },
    );

    // nn(arr): flattened array without empty cells.
    engine.register_fn("nn", nn);

    engine.register_fn("SUM", |arr: Array| -> f64 { numbers(arr).iter().sum() });
    engine.register_fn("AVG", |arr: Array| -> f64 {
        let nums = numbers(arr);
        if nums.is_empty() {
            0.0
        } else {
            nums.iter().sum::<f64>() / nums.len() as f64
        }
    });
    engine.register_fn("MIN", |arr: Array| -> f64 {
        numbers(arr).into_iter().reduce(f64::min).unwrap_or(0.0)
    });
    engine.register_fn("MAX", |arr: Array| -> f64 {
        numbers(arr).into_iter().reduce(f64::max).unwrap_or(0.0)
    });
    engine.register_fn("LEN", |arr: Array| -> i64 { nn(arr).len() as i64 });

    // SUMIF(arr, predicate) / COUNTIF(arr, predicate)
    engine.register_fn(
        "SUMIF",
        |ctx: NativeCallContext, arr: Array, pred: FnPtr| -> Result<f64, Box<EvalAltResult>> {
            let mut sum = 0.0;
            for item in nn(arr) {
                let Some(n) = numeric(&item) else {
                    continue;
                };
                if pred.call_within_context::<bool>(&ctx, (item,))? {
                    sum += n;
                }
            }
            Ok(sum)
        },
    );
    engine.register_fn(
        "COUNTIF",
        |ctx: NativeCallContext, arr: Array, pred: FnPtr| -> Result<i64, Box<EvalAltResult>> {
            let mut count = 0;
            for item in nn(arr) {
                if pred.call_within_context::<bool>(&ctx, (item,))? {
                    count += 1;
                }
            }
            Ok(count)
        },
    );

    // LIST(x): ranges to arrays, identity for arrays.
    engine.register_fn("LIST", |arr: Array| -> Array { arr });
    engine.register_fn("LIST", |range: Range<i64>| -> Array {
        range.map(Dynamic::from).collect()
    });
    engine.register_fn("LIST", |range: RangeInclusive<i64>| -> Array {
        range.map(Dynamic::from).collect()
    });

    // IS_ERROR(x): true for values of failed cells.
    engine.register_fn("IS_ERROR", |value: Dynamic| -> bool { value.is::<EvalError>() });
    engine.register_fn(
        "ERROR",
        |message: &str| -> EvalError { EvalError::new(EvalErrorKind::Generic, message) },
    );

    // POW(base, exp): exponentiation
    // Handle all type combinations since cell values can be int or float
    engine.register_fn("POW", |base: f64, exp: f64| -> f64 { base.powf(exp) });
    engine.register_fn("POW", |base: f64, exp: i64| -> f64 {
        base.powf(exp as f64)
    });
    engine.register_fn("POW", |base: i64, exp: f64| -> f64 {
        (base as f64).powf(exp)
    });
    engine.register_fn("POW", |base: i64, exp: i64| -> f64 {
        (base as f64).powf(exp as f64)
    });

    engine.register_fn("SQRT", |x: f64| -> f64 { x.sqrt() });
    engine.register_fn("SQRT", |x: i64| -> f64 { (x as f64).sqrt() });

    // RAND(): random float in [0.0, 1.0)
    engine.register_fn("RAND", || -> f64 { rand::thread_rng().r#gen() });

    // RANDINT(min, max): random integer in [min, max] inclusive
    engine.register_fn(
        "RANDINT",
        |min: i64, max: i64| -> Result<i64, Box<EvalAltResult>> {
            if min > max {
                return Err(invalid_arg("RANDINT: min must be <= max"));
            }
            Ok(rand::thread_rng().gen_range(min..=max))
        },
    );

    // FIXED(n, decimals): format with a fixed number of decimal places.
    engine.register_fn(
        "FIXED",
        |n: f64, decimals: i64| -> Result<String, Box<EvalAltResult>> {
            let decimals = to_decimal_places(decimals)?;
            Ok(fixed_decimal_string(n, decimals))
        },
    );
    engine.register_fn(
        "FIXED",
        |n: i64, decimals: i64| -> Result<String, Box<EvalAltResult>> {
            let decimals = to_decimal_places(decimals)?;
            Ok(fixed_decimal_string(n as f64, decimals))
        },
    );

    engine.register_fn("B64ENCODE", |text: &str| -> String { BASE64.encode(text) });
    engine.register_fn(
        "B64DECODE",
        |text: &str| -> Result<String, Box<EvalAltResult>> {
            let bytes = BASE64
                .decode(text)
                .map_err(|e| invalid_arg(&format!("B64DECODE: {}", e)))?;
            String::from_utf8(bytes).map_err(|_| invalid_arg("B64DECODE: not valid UTF-8"))
        },
    );

    engine.register_fn(
        "RE_MATCH",
        |pattern: &str, text: &str| -> Result<bool, Box<EvalAltResult>> {
            Ok(regex_arg(pattern)?.is_match(text))
        },
    );
    engine.register_fn(
        "RE_FIND_ALL",
        |pattern: &str, text: &str| -> Result<Array, Box<EvalAltResult>> {
            Ok(regex_arg(pattern)?
                .find_iter(text)
                .map(|m| Dynamic::from(m.as_str().to_string()))
                .collect())
        },
    );
    engine.register_fn(
        "RE_REPLACE",
        |pattern: &str, text: &str, with: &str| -> Result<String, Box<EvalAltResult>> {
            Ok(regex_arg(pattern)?.replace_all(text, with).into_owned())
        },
    );

    engine.register_fn("NOW", || -> String {
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    });
    engine.register_fn("TODAY", || -> String {
        chrono::Local::now().format("%Y-%m-%d").to_string()
    });
}

/// Register macro-only write builtins.
/// These are NOT available in cell code, only when running the macro script.
pub fn register_script_builtins(engine: &mut Engine, source: Arc<dyn CellSource>) {
    // SET_CELL(r, c, t, code): store code text; non-strings are stored as
    // their literal form.
    let src_set = source.clone();
    engine.register_fn(
        "SET_CELL",
        move |r: i64, c: i64, t: i64, code: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let key = Key::new(to_usize(r, "row")?, to_usize(c, "col")?, to_usize(t, "table")?);
            let code = dynamic_to_code(code);
            src_set.set_code(key, Some(code)).map_err(|e| invalid_arg(&e))
        },
    );

    // CLEAR_CELL(r, c, t)
    let src_clear = source;
    engine.register_fn(
        "CLEAR_CELL",
        move |r: i64, c: i64, t: i64| -> Result<(), Box<EvalAltResult>> {
            let key = Key::new(to_usize(r, "row")?, to_usize(c, "col")?, to_usize(t, "table")?);
            src_clear.set_code(key, None).map_err(|e| invalid_arg(&e))
        },
    );
}

fn dynamic_to_code(value: Dynamic) -> String {
    if value.is_string() {
        return value.into_string().unwrap_or_default();
    }
    if let Ok(f) = value.as_float() {
        return crate::engine::format_number(f);
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Shape, Watchdog, create_engine};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Cells hold integer constants; code is the number's text.
    #[derive(Default)]
    struct Numbers {
        cells: Mutex<HashMap<Key, i64>>,
    }

    impl CellSource for Numbers {
        fn value(&self, _: &Engine, index: CellIndex) -> Result<Dynamic, Box<EvalAltResult>> {
            let cells = self.cells.lock().unwrap();
            let get = |k: Key| cells.get(&k).map(|v| Dynamic::from(*v)).unwrap_or(Dynamic::UNIT);
            match index.as_key() {
                Some(key) => Ok(get(key)),
                None => {
                    let Index::Slice(rows) = &index.0[0] else {
                        return Err(invalid_arg("only row slices in this test"));
                    };
                    Ok(Dynamic::from_array(
                        rows.indices(10).into_iter().map(|r| get(Key::new(r, 0, 0))).collect(),
                    ))
                }
            }
        }
        fn code(&self, key: Key) -> Option<String> {
            self.cells.lock().unwrap().get(&key).map(|v| v.to_string())
        }
        fn shape(&self) -> Shape {
            Shape::new(10, 1, 1)
        }
        fn set_code(&self, key: Key, code: Option<String>) -> Result<(), String> {
            let mut cells = self.cells.lock().unwrap();
            match code {
                Some(code) => {
                    let n = code.parse().map_err(|_| format!("not a number: {}", code))?;
                    cells.insert(key, n);
                }
                None => {
                    cells.remove(&key);
                }
            }
            Ok(())
        }
    }

    fn setup(values: &[(usize, i64)]) -> (Arc<Numbers>, Engine) {
        let source = Arc::new(Numbers::default());
        for (row, v) in values {
            source.cells.lock().unwrap().insert(Key::new(*row, 0, 0), *v);
        }
        let engine = create_engine(source.clone(), &Watchdog::new());
        (source, engine)
    }

    #[test]
    fn test_cell_reads_source() {
        let (_, engine) = setup(&[(1, 7)]);
        let v: i64 = engine.eval("CELL(1, 0, 0) * 2").unwrap();
        assert_eq!(v, 14);
        assert!(engine.eval::<Dynamic>("CELL(2, 0, 0)").unwrap().is_unit());
        let v: i64 = engine.eval("CELL([1, 0, 0])").unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn test_cell_with_slice_and_range() {
        let (_, engine) = setup(&[(0, 1), (1, 2), (2, 3)]);
        let v: f64 = engine.eval("SUM(CELL(SLICE(0, 3, ()), 0, 0))").unwrap();
        assert_eq!(v, 6.0);
        let v: f64 = engine.eval("SUM(CELL(0..2, 0, 0))").unwrap();
        assert_eq!(v, 3.0);
        let v: f64 = engine.eval("SUM(CELL(0..=2, 0, 0))").unwrap();
        assert_eq!(v, 6.0);
    }

    #[test]
    fn test_slice_rejects_zero_step() {
        let (_, engine) = setup(&[]);
        assert!(engine.eval::<Dynamic>("SLICE(0, 3, 0)").is_err());
    }

    #[test]
    fn test_aggregates_skip_empty_cells() {
        let (_, engine) = setup(&[(0, 4), (2, 8)]);
        let v: f64 = engine.eval("AVG(CELL(SLICE((), (), ()), 0, 0))").unwrap();
        assert_eq!(v, 6.0);
        let n: i64 = engine.eval("LEN(CELL(SLICE(0, 3, ()), 0, 0))").unwrap();
        assert_eq!(n, 2);
        let v: f64 = engine.eval("MAX([1, [5, ()], 3])").unwrap();
        assert_eq!(v, 5.0);
    }

    #[test]
    fn test_sumif_and_countif() {
        let (_, engine) = setup(&[]);
        let v: f64 = engine.eval("SUMIF([10, 20, 30, 5], |x| x > 10)").unwrap();
        assert_eq!(v, 50.0);
        let n: i64 = engine.eval("COUNTIF([10, 20, 30, 5], |x| x >= 10)").unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_base64_and_regex() {
        let (_, engine) = setup(&[]);
        let s: String = engine.eval(r#"B64ENCODE("hello")"#).unwrap();
        assert_eq!(s, "aGVsbG8=");
        let s: String = engine.eval(r#"B64DECODE("aGVsbG8=")"#).unwrap();
        assert_eq!(s, "hello");
        let ok: bool = engine.eval(r#"RE_MATCH("^a+b$", "aaab")"#).unwrap();
        assert!(ok);
        let found: Array = engine.eval(r#"RE_FIND_ALL("[0-9]+", "a1b22c333")"#).unwrap();
        assert_eq!(found.len(), 3);
        let s: String = engine.eval(r#"RE_REPLACE("o", "foo", "0")"#).unwrap();
        assert_eq!(s, "f00");
    }

    #[test]
    fn test_randint_returns_value_in_range() {
        let (_, engine) = setup(&[]);
        for _ in 0..50 {
            let n: i64 = engine.eval("RANDINT(1, 3)").unwrap();
            assert!((1..=3).contains(&n));
        }
        assert!(engine.eval::<Dynamic>("RANDINT(3, 1)").is_err());
    }

    #[test]
    fn test_fixed_pads_decimals() {
        let (_, engine) = setup(&[]);
        let s: String = engine.eval("FIXED(2.5, 3)").unwrap();
        assert_eq!(s, "2.500");
        let s: String = engine.eval("FIXED(7, 1)").unwrap();
        assert_eq!(s, "7.0");
        assert!(engine.eval::<Dynamic>("FIXED(1.0, 13)").is_err());
        assert!(engine.eval::<Dynamic>("FIXED(1.0, -1)").is_err());
    }

    #[test]
    fn test_list_materializes_ranges() {
        let (_, engine) = setup(&[]);
        let arr: Array = engine.eval("LIST(1..=3)").unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_script_builtins_set_and_clear() {
        let (source, mut engine) = setup(&[(0, 1)]);
        register_script_builtins(&mut engine, source.clone());
        engine.run("SET_CELL(3, 0, 0, 42)").unwrap();
        assert_eq!(source.code(Key::new(3, 0, 0)).as_deref(), Some("42"));
        engine.run("CLEAR_CELL(0, 0, 0)").unwrap();
        assert_eq!(source.code(Key::new(0, 0, 0)), None);
        assert!(engine.run("SET_CELL(-1, 0, 0, 1)").is_err());
    }
}
