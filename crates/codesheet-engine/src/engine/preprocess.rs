//! Cell code preprocessing.
//!
//! Before cell code can be evaluated by Rhai, grid subscripts must be turned
//! into function calls:
//!
//! - `S[r, c, t]` → `CELL(r, c, t)`
//! - `S[0:3, 0, 0]` → `CELL(SLICE(0, 3, ()), 0, 0)`
//! - `S[[r, c, t]]` → `CELL([r, c, t])`
//!
//! String literals and comments are left untouched. This module also finds
//! the last top-level statement of a script and its assignment target, which
//! is how a cell ending in `x = 5` yields `5`.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:let\s+|const\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*(?:\*\*|<<|>>|[-+*/%&|^])?=(?:[^=]|$)",
        )
        .expect("assignment regex must compile")
    })
}

fn plain_assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=(?:[^=]|$)")
            .expect("plain assignment regex must compile")
    })
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// If a string literal or comment starts at `i`, return the index just past it.
fn skip_literal(bytes: &[u8], i: usize) -> Option<usize> {
    let len = bytes.len();
    match bytes[i] {
        quote @ (b'"' | b'\'') => {
            let mut j = i + 1;
            while j < len {
                match bytes[j] {
                    b'\\' => j += 2,
                    b if b == quote => return Some(j + 1),
                    _ => j += 1,
                }
            }
            Some(len)
        }
        b'`' => {
            let end = bytes[i + 1..]
                .iter()
                .position(|&b| b == b'`')
                .map(|p| i + 1 + p + 1);
            Some(end.unwrap_or(len))
        }
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
            let end = bytes[i..].iter().position(|&b| b == b'\n').map(|p| i + p);
            Some(end.unwrap_or(len))
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            let mut j = i + 2;
            while j + 1 < len {
                if bytes[j] == b'*' && bytes[j + 1] == b'/' {
                    return Some(j + 2);
                }
                j += 1;
            }
            Some(len)
        }
        _ => None,
    }
}

/// Index of the bracket closing the one opened at `open`.
fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(end) = skip_literal(bytes, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split `text` on `sep` wherever it appears outside brackets and literals.
fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if let Some(end) = skip_literal(bytes, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b if b == sep && depth == 0 => {
                parts.push(&text[last..i]);
                last = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[last..]);
    parts
}

/// Split an index component on slice colons. A `::` between identifiers is a
/// Rhai namespace path, not a slice.
fn split_slice(component: &str) -> Vec<&str> {
    let bytes = component.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if let Some(end) = skip_literal(bytes, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => {
                let is_path = bytes.get(i + 1) == Some(&b':')
                    && i > 0
                    && is_ident_byte(bytes[i - 1])
                    && bytes.get(i + 2).is_some_and(|&b| is_ident_byte(b));
                if is_path {
                    i += 2;
                    continue;
                }
                parts.push(&component[last..i]);
                last = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&component[last..]);
    parts
}

fn rewrite_component(component: &str) -> String {
    let parts = split_slice(component);
    if parts.len() == 1 {
        return preprocess_script(component.trim());
    }
    let mut args: Vec<String> = parts
        .iter()
        .map(|p| {
            let p = p.trim();
            if p.is_empty() {
                "()".to_string()
            } else {
                preprocess_script(p)
            }
        })
        .collect();
    args.resize(3, "()".to_string());
    format!("SLICE({})", args.join(", "))
}

fn rewrite_index(inner: &str) -> String {
    let components: Vec<String> = split_top_level(inner, b',')
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .map(rewrite_component)
        .collect();
    format!("CELL({})", components.join(", "))
}

/// Rewrite grid subscripts `S[...]` into `CELL(...)` calls, outside string
/// literals and comments.
pub fn preprocess_script(script: &str) -> String {
    let bytes = script.as_bytes();
    let mut out = String::with_capacity(script.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if let Some(end) = skip_literal(bytes, i) {
            i = end;
            continue;
        }
        let starts_ref = bytes[i] == b'S'
            && (i == 0 || !(is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'.'));
        if starts_ref {
            let mut open = i + 1;
            while open < bytes.len() && bytes[open].is_ascii_whitespace() {
                open += 1;
            }
            if bytes.get(open) == Some(&b'[')
                && let Some(close) = matching_bracket(bytes, open)
            {
                out.push_str(&script[copied..i]);
                out.push_str(&rewrite_index(&script[open + 1..close]));
                i = close + 1;
                copied = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&script[copied..]);
    out
}

/// The last non-empty top-level statement of `script`.
pub fn last_statement(script: &str) -> &str {
    split_top_level(script, b';')
        .into_iter()
        .rev()
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.starts_with("//"))
        .unwrap_or("")
}

/// Name bound by `statement` when it is an assignment (`x = 1`, `let x = 1`,
/// `x += 1`). Comparisons such as `x == 1` are not assignments.
pub fn assignment_target(statement: &str) -> Option<&str> {
    assignment_re()
        .captures(statement)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Prefix a trailing bare assignment `x = ...` with `let` when `x` is not
/// bound yet, so the last statement of a cell may introduce a variable.
pub fn declare_trailing_assignment<'a>(
    code: &'a str,
    is_bound: impl Fn(&str) -> bool,
) -> Cow<'a, str> {
    let statement = last_statement(code);
    let Some(name) = plain_assignment_re()
        .captures(statement)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return Cow::Borrowed(code);
    };
    if is_bound(name) {
        return Cow::Borrowed(code);
    }
    let offset = statement.as_ptr() as usize - code.as_ptr() as usize;
    Cow::Owned(format!("{}let {}", &code[..offset], &code[offset..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_plain_reference() {
        assert_eq!(preprocess_script("S[0, 1, 0] + 1"), "CELL(0, 1, 0) + 1");
        assert_eq!(preprocess_script("S [X - 1, Y, Z]"), "CELL(X - 1, Y, Z)");
    }

    #[test]
    fn test_preprocess_slices() {
        assert_eq!(
            preprocess_script("SUM(S[0:3, 0, 0])"),
            "SUM(CELL(SLICE(0, 3, ()), 0, 0))"
        );
        assert_eq!(
            preprocess_script("S[:, ::2, 0]"),
            "CELL(SLICE((), (), ()), SLICE((), (), 2), 0)"
        );
        assert_eq!(
            preprocess_script("S[-2:, 0, 0]"),
            "CELL(SLICE(-2, (), ()), 0, 0)"
        );
    }

    #[test]
    fn test_preprocess_nested_and_array_forms() {
        assert_eq!(
            preprocess_script("S[S[0, 0, 0], 1, 0]"),
            "CELL(CELL(0, 0, 0), 1, 0)"
        );
        assert_eq!(preprocess_script("S[[1, 2, 0]]"), "CELL([1, 2, 0])");
    }

    #[test]
    fn test_preprocess_skips_strings_and_identifiers() {
        assert_eq!(preprocess_script(r#""S[0, 0, 0]""#), r#""S[0, 0, 0]""#);
        assert_eq!(preprocess_script("XS[0]"), "XS[0]");
        assert_eq!(preprocess_script("x.S[0]"), "x.S[0]");
        assert_eq!(
            preprocess_script("// S[1, 1, 1]\nS[0, 0, 0]"),
            "// S[1, 1, 1]\nCELL(0, 0, 0)"
        );
    }

    #[test]
    fn test_preprocess_keeps_namespace_paths() {
        assert_eq!(
            preprocess_script("S[math::floor(1.5), 0, 0]"),
            "CELL(math::floor(1.5), 0, 0)"
        );
    }

    #[test]
    fn test_last_statement() {
        assert_eq!(last_statement("let a = 1; a + 2"), "a + 2");
        assert_eq!(last_statement("x = 5;"), "x = 5");
        assert_eq!(last_statement(r#"let s = "a;b"; s"#), "s");
        assert_eq!(last_statement("fn f() { 1; 2 } f()"), "fn f() { 1; 2 } f()");
    }

    #[test]
    fn test_declare_trailing_assignment() {
        let unbound = |_: &str| false;
        assert_eq!(declare_trailing_assignment("x = 5", unbound), "let x = 5");
        assert_eq!(
            declare_trailing_assignment("let a = 1; b = a + 1", unbound),
            "let a = 1; let b = a + 1"
        );
        assert_eq!(declare_trailing_assignment("x = 5", |n| n == "x"), "x = 5");
        assert_eq!(declare_trailing_assignment("let x = 5", unbound), "let x = 5");
        assert_eq!(declare_trailing_assignment("x == 5", unbound), "x == 5");
    }

    #[test]
    fn test_assignment_target() {
        assert_eq!(assignment_target("x = 5"), Some("x"));
        assert_eq!(assignment_target("let total = a + b"), Some("total"));
        assert_eq!(assignment_target("n += 1"), Some("n"));
        assert_eq!(assignment_target("x == 5"), None);
        assert_eq!(assignment_target("x <= 5"), None);
        assert_eq!(assignment_target("1 + 2"), None);
    }
}
