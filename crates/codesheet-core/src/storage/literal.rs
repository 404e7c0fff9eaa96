//! Safe reader for the Python-style literals used in save files.
//!
//! Only literal forms are accepted: `None`, `True`, `False`, integers,
//! floats, quoted strings, tuples and lists. Nothing is evaluated.

use crate::attributes::AttrValue;
use crate::error::{CodesheetError, Result};

/// Parse one literal filling the whole of `text`.
pub fn parse_literal(text: &str) -> Result<AttrValue> {
    let mut parser = LiteralParser { text, pos: 0 };
    let value = parser
        .value()
        .and_then(|v| {
            parser.skip_ws();
            match parser.peek() {
                None => Ok(v),
                Some(ch) => Err(format!("unexpected {:?} after literal", ch)),
            }
        })
        .map_err(|message| CodesheetError::Literal {
            text: text.to_string(),
            message,
        })?;
    Ok(value)
}

/// Parse a list of `(a, b)` pairs of non-negative integers.
pub fn parse_pairs(text: &str) -> Result<Vec<(usize, usize)>> {
    let invalid = |message: &str| CodesheetError::Literal {
        text: text.to_string(),
        message: message.to_string(),
    };
    items(parse_literal(text)?)
        .ok_or_else(|| invalid("expected a list"))?
        .into_iter()
        .map(|item| match items(item).as_deref() {
            Some([a, b]) => match (index(a), index(b)) {
                (Some(a), Some(b)) => Ok((a, b)),
                _ => Err(invalid("bad index")),
            },
            _ => Err(invalid("expected (row, col) pairs")),
        })
        .collect()
}

/// Parse a list of non-negative integers.
pub fn parse_indices(text: &str) -> Result<Vec<usize>> {
    let invalid = |message: &str| CodesheetError::Literal {
        text: text.to_string(),
        message: message.to_string(),
    };
    items(parse_literal(text)?)
        .ok_or_else(|| invalid("expected a list"))?
        .iter()
        .map(|item| index(item).ok_or_else(|| invalid("bad index")))
        .collect()
}

fn items(value: AttrValue) -> Option<Vec<AttrValue>> {
    match value {
        AttrValue::List(items) | AttrValue::Tuple(items) => Some(items),
        _ => None,
    }
}

fn index(value: &AttrValue) -> Option<usize> {
    value.as_int().and_then(|n| usize::try_from(n).ok())
}

struct LiteralParser<'a> {
    text: &'a str,
    pos: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn value(&mut self) -> std::result::Result<AttrValue, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("unexpected end of literal".to_string()),
            Some('(') => {
                self.bump();
                let (items, trailing_comma) = self.sequence(')')?;
                if items.len() == 1 && !trailing_comma {
                    return Ok(items.into_iter().next().unwrap_or(AttrValue::None));
                }
                Ok(AttrValue::Tuple(items))
            }
            Some('[') => {
                self.bump();
                let (items, _) = self.sequence(']')?;
                Ok(AttrValue::List(items))
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                self.string(quote).map(AttrValue::Str)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '-' || ch == '+' || ch == '.' => self.number(),
            Some(ch) if ch.is_alphabetic() => self.word(),
            Some(ch) => Err(format!("unexpected {:?}", ch)),
        }
    }

    /// Items up to `close`, and whether the last one had a trailing comma.
    fn sequence(&mut self, close: char) -> std::result::Result<(Vec<AttrValue>, bool), String> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(ch) if ch == close => return Ok((items, false)),
                Some(ch) => return Err(format!("expected ',' or {:?}, found {:?}", close, ch)),
                None => return Err(format!("missing {:?}", close)),
            }
        }
    }

    fn string(&mut self, quote: char) -> std::result::Result<String, String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".to_string()),
                Some(ch) if ch == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(ch @ ('\\' | '\'' | '"')) => out.push(ch),
                    Some(ch) => {
                        out.push('\\');
                        out.push(ch);
                    }
                    None => return Err("unterminated string".to_string()),
                },
                Some(ch) => out.push(ch),
            }
        }
    }

    fn number(&mut self) -> std::result::Result<AttrValue, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '+' | '.' | '_'))
        {
            self.bump();
        }
        let token: String = self.text[start..self.pos].chars().filter(|&c| c != '_').collect();
        if let Ok(n) = token.parse::<i64>() {
            return Ok(AttrValue::Int(n));
        }
        match token.as_str() {
            "-inf" => Ok(AttrValue::Float(f64::NEG_INFINITY)),
            "+inf" => Ok(AttrValue::Float(f64::INFINITY)),
            _ => token
                .parse::<f64>()
                .map(AttrValue::Float)
                .map_err(|_| format!("invalid number {:?}", token)),
        }
    }

    fn word(&mut self) -> std::result::Result<AttrValue, String> {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_alphanumeric() || ch == '_') {
            self.bump();
        }
        match &self.text[start..self.pos] {
            "None" => Ok(AttrValue::None),
            "True" => Ok(AttrValue::Bool(true)),
            "False" => Ok(AttrValue::Bool(false)),
            "inf" => Ok(AttrValue::Float(f64::INFINITY)),
            "nan" | "NaN" => Ok(AttrValue::Float(f64::NAN)),
            other => Err(format!("{:?} is not a literal", other)),
        }
    }
}
