use rhai::Dynamic;

use super::error::EvalError;

/// Format a Dynamic value for display.
pub fn format_dynamic(value: &Dynamic) -> String {
    if value.is_unit() {
        String::new()
    } else if let Ok(n) = value.as_float() {
        format_number(n)
    } else if let Ok(n) = value.as_int() {
        n.to_string()
    } else if let Ok(b) = value.as_bool() {
        if b { "True" } else { "False" }.to_string()
    } else if value.is_string() {
        value.clone().into_string().unwrap_or_default()
    } else if let Some(err) = value.clone().try_cast::<EvalError>() {
        err.to_string()
    } else if value.is_array() {
        let items = value.clone().into_array().unwrap_or_default();
        let parts: Vec<String> = items.iter().map(format_item).collect();
        format!("[{}]", parts.join(", "))
    } else {
        value.to_string()
    }
}

/// Format an array element: strings are quoted, everything else as usual.
fn format_item(value: &Dynamic) -> String {
    if value.is_string() {
        format!("{:?}", value.clone().into_string().unwrap_or_default())
    } else {
        format_dynamic(value)
    }
}

/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}

/// Format a value and cut it to at most `max_len` characters.
pub fn format_truncated(value: &Dynamic, max_len: usize) -> String {
    let text = format_dynamic(value);
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}
