//! Evaluation failures stored as cell results.
//!
//! A cell whose code fails does not abort the caller: its result becomes an
//! [`EvalError`] value, which other cells can read and which renders as
//! `"<Kind>: <message>"`.

use rhai::EvalAltResult;
use std::fmt;
use std::time::Duration;

use super::key::Key;

/// Failure category of a cell evaluation.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum EvalErrorKind {
    /// Unknown property, method, function or indexer.
    Attribute,
    /// Script-raised or arithmetic failure.
    Runtime,
    /// The watchdog stopped the evaluation.
    Timeout,
    /// Anything else, including parse errors.
    Generic,
    /// The cell depends on itself.
    Cycle,
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvalErrorKind::Attribute => "AttributeError",
            EvalErrorKind::Runtime => "RuntimeError",
            EvalErrorKind::Timeout => "TimeoutError",
            EvalErrorKind::Generic => "Error",
            EvalErrorKind::Cycle => "CycleError",
        };
        f.write_str(name)
    }
}

/// A failed cell evaluation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> EvalError {
        EvalError {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(limit: Duration) -> EvalError {
        EvalError::new(
            EvalErrorKind::Timeout,
            format!("Timeout ({} s)", limit.as_secs_f64()),
        )
    }

    pub fn cycle(key: Key) -> EvalError {
        EvalError::new(
            EvalErrorKind::Cycle,
            format!("cell {} depends on itself", key),
        )
    }

    /// Classify a Rhai failure. `limit` is the watchdog timeout in effect.
    pub fn from_rhai(err: &EvalAltResult, limit: Duration) -> EvalError {
        let kind = classify(err);
        if kind == EvalErrorKind::Timeout {
            return EvalError::timeout(limit);
        }
        EvalError::new(kind, innermost(err).to_string())
    }
}

fn innermost(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => innermost(inner),
        _ => err,
    }
}

fn classify(err: &EvalAltResult) -> EvalErrorKind {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify(inner),
        EvalAltResult::ErrorTerminated(..) => EvalErrorKind::Timeout,
        EvalAltResult::ErrorPropertyNotFound(..)
        | EvalAltResult::ErrorDotExpr(..)
        | EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorIndexingType(..) => EvalErrorKind::Attribute,
        EvalAltResult::ErrorRuntime(..)
        | EvalAltResult::ErrorArithmetic(..)
        | EvalAltResult::ErrorMismatchDataType(..)
        | EvalAltResult::ErrorMismatchOutputType(..)
        | EvalAltResult::ErrorArrayBounds(..)
        | EvalAltResult::ErrorStringBounds(..)
        | EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorTooManyOperations(..) => EvalErrorKind::Runtime,
        _ => EvalErrorKind::Generic,
    }
}

/// Printable traceback of a script failure, outermost call first.
pub fn traceback(err: &EvalAltResult) -> String {
    let mut lines = vec!["Traceback (most recent call last):".to_string()];
    let mut current = err;
    while let EvalAltResult::ErrorInFunctionCall(name, _, inner, pos) = current {
        lines.push(format!("  in function '{}' at {}", name, pos));
        current = inner.as_ref();
    }
    lines.push(format!("  {}", current));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::{Engine, Position};

    #[test]
    fn test_classify_runtime_throw() {
        let engine = Engine::new();
        let err = engine.eval::<rhai::Dynamic>(r#"throw "boom""#).unwrap_err();
        let e = EvalError::from_rhai(&err, Duration::from_secs(1));
        assert_eq!(e.kind, EvalErrorKind::Runtime);
        assert!(e.message.contains("boom"));
    }

    #[test]
    fn test_classify_missing_function() {
        let engine = Engine::new();
        let err = engine.eval::<rhai::Dynamic>("no_such_fn(1)").unwrap_err();
        let e = EvalError::from_rhai(&err, Duration::from_secs(1));
        assert_eq!(e.kind, EvalErrorKind::Attribute);
        assert!(e.to_string().starts_with("AttributeError: "));
    }

    #[test]
    fn test_terminated_is_timeout() {
        let err = EvalAltResult::ErrorTerminated(rhai::Dynamic::UNIT, Position::NONE);
        let e = EvalError::from_rhai(&err, Duration::from_secs(10));
        assert_eq!(e.kind, EvalErrorKind::Timeout);
        assert_eq!(e.message, "Timeout (10 s)");
    }

    #[test]
    fn test_traceback_lists_function_frames() {
        let engine = Engine::new();
        let err = engine
            .eval::<rhai::Dynamic>(r#"fn inner() { throw "deep" } inner()"#)
            .unwrap_err();
        let text = traceback(&err);
        assert!(text.starts_with("Traceback"));
        assert!(text.contains("inner"));
        assert!(text.contains("deep"));
    }
}
