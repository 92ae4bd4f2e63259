//! Best-effort literal grammar used to re-type cells read back from storage.
//!
//! Accepted forms (surrounding whitespace is ignored):
//!
//! | Form | Example | Result |
//! |------|---------|--------|
//! | integer | `12`, `-3`, `1_000` | integer (float when outside `i64`) |
//! | float | `1.5`, `.5`, `2.`, `1e-3` | float |
//! | keyword | `True`, `false`, `None`, `null` | boolean / null |
//! | string | `'a'`, `"b\n"` | unquoted string |
//! | sequence | `[1, 2]`, `(1, 'x',)` | array |
//! | mapping | `{'k': 1, 2: [3]}` | object (keys stringified) |
//!
//! Integers with a leading zero (`012`) are rejected, as are trailing
//! characters after a complete literal. This is not JSON: quoted keys may
//! use single quotes and tuples are accepted.

use serde_json::{Map, Number, Value};

use super::Cell;

const MAX_DEPTH: usize = 64;

/// Parse `text` as a literal, returning `None` when it is not one
pub fn parse_literal(text: &str) -> Option<Value> {
    let mut parser = Parser { src: text, pos: 0 };
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos == parser.src.len() {
        Some(value)
    } else {
        None
    }
}

/// Re-type a raw cell string; anything that is not a scalar literal stays as text
pub fn eval_cell(raw: &str) -> Cell {
    match parse_literal(raw) {
        Some(Value::Null) => Cell::Empty,
        Some(Value::Bool(b)) => Cell::Bool(b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map(Cell::Float).unwrap_or_else(|| Cell::text(raw)),
        },
        Some(Value::String(s)) => Cell::Text(s),
        _ => Cell::text(raw),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn value(&mut self, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }
        self.skip_ws();
        match self.peek()? {
            '\'' | '"' => self.string().map(Value::String),
            '[' => self.sequence(']', depth),
            '(' => self.sequence(')', depth),
            '{' => self.mapping(depth),
            c if c == '+' || c == '-' || c == '.' || c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() => self.keyword(),
            _ => None,
        }
    }

    fn keyword(&mut self) -> Option<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            "None" | "null" => Some(Value::Null),
            _ => None,
        }
    }

    /// Consume a run of digits with single `_` separators, returning the digit count
    fn digits(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    self.bump();
                    count += 1;
                }
                Some('_')
                    if count > 0 && matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) =>
                {
                    self.bump();
                }
                _ => break,
            }
        }
        count
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        let int_start = self.pos;
        let int_digits = self.digits();
        let int_part = &self.src[int_start..self.pos];
        let mut is_float = false;

        if self.peek() == Some('.') {
            self.bump();
            is_float = true;
            let frac_digits = self.digits();
            if int_digits == 0 && frac_digits == 0 {
                return None;
            }
        } else if int_digits == 0 {
            return None;
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.digits() == 0 {
                return None;
            }
            is_float = true;
        }

        let raw: String = self.src[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        if is_float {
            let f: f64 = raw.parse().ok()?;
            return Number::from_f64(f).map(Value::Number);
        }

        // leading zeros are only legal for zero itself
        if int_part.len() > 1 && int_part.starts_with('0') && int_part.chars().any(|c| c != '0' && c != '_') {
            return None;
        }

        match raw.parse::<i64>() {
            Ok(i) => Some(Value::from(i)),
            Err(_) => raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\n' => return None,
                '\\' => {
                    let escaped = self.bump()?;
                    match escaped {
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        '0' => out.push('\0'),
                        'a' => out.push('\u{07}'),
                        'b' => out.push('\u{08}'),
                        'f' => out.push('\u{0c}'),
                        'v' => out.push('\u{0b}'),
                        '\\' | '\'' | '"' => out.push(escaped),
                        '\n' => {}
                        'x' => out.push(self.hex_escape(2)?),
                        'u' => out.push(self.hex_escape(4)?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn hex_escape(&mut self, len: usize) -> Option<char> {
        let end = self.pos.checked_add(len)?;
        let hex = self.src.get(self.pos..end)?;
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.pos = end;
        char::from_u32(code)
    }

    fn sequence(&mut self, close: char, depth: usize) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();
        let mut saw_comma = false;
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Some(Value::Array(items));
        }
        loop {
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.bump()? {
                ',' => {
                    saw_comma = true;
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        self.bump();
                        break;
                    }
                }
                c if c == close => break,
                _ => return None,
            }
        }
        // a parenthesised single value is just that value
        if close == ')' && !saw_comma && items.len() == 1 {
            return items.pop();
        }
        Some(Value::Array(items))
    }

    fn mapping(&mut self, depth: usize) -> Option<Value> {
        self.bump();
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.bump();
            return Some(Value::Object(map));
        }
        loop {
            let key = match self.value(depth + 1)? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => if b { "True" } else { "False" }.to_string(),
                _ => return None,
            };
            self.skip_ws();
            if self.bump()? != ':' {
                return None;
            }
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump()? {
                ',' => {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.bump();
                        break;
                    }
                }
                '}' => break,
                _ => return None,
            }
        }
        Some(Value::Object(map))
    }
}
