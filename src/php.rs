// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! PHP configuration literals.
//!
//! Magento persists its deployment configuration as a PHP file that returns a
//! nested array literal:
//!
//! ```text
//! <?php
//! return [
//!     'backend' => [
//!         'frontName' => 'admin',
//!     ],
//! ];
//! ```
//!
//! Only the literal subset that configuration files actually use is
//! understood: strings, integers, floats, booleans, null, and arrays written
//! either as `[...]` or `array(...)`. Comments and trailing commas are
//! tolerated. Anything else is a parse error, never evaluated.
//!
//! Key order is preserved. Documents are always written back in one canonical
//! short array layout, so writing a parsed document and parsing it again
//! yields the same tree.

use std::{
    fmt::{Display, Formatter, Result as FmtResult, Write},
    str::FromStr,
};

const INDENT: &str = "    ";

/// PHP literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Array),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Self::Array(array)
    }
}

/// Array key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::Str(key.into())
    }
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Self::Int(key)
    }
}

/// Ordered PHP array.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Array(Vec<(Key, Value)>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.0.iter().map(|(key, value)| (key, value))
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        let key = key.into();
        self.0
            .iter()
            .find(|(entry, _)| *entry == key)
            .map(|(_, value)| value)
    }

    /// Follow string keys through nested arrays.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut array = self;
        for key in parents {
            array = array.get(*key)?.as_array()?;
        }

        array.get(*last)
    }

    /// Set key to value, keeping the position of an existing key.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(entry, _)| *entry == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    /// Nested array at key, created or replaced when not an array.
    pub fn array_mut(&mut self, key: impl Into<Key>) -> &mut Array {
        let key = key.into();
        let index = match self.0.iter().position(|(entry, _)| *entry == key) {
            Some(index) => index,
            None => {
                self.0.push((key, Value::Array(Array::new())));
                self.0.len() - 1
            }
        };

        let slot = &mut self.0[index].1;
        if !matches!(slot, Value::Array(_)) {
            *slot = Value::Array(Array::new());
        }

        match slot {
            Value::Array(array) => array,
            _ => unreachable!("slot was just made an array"),
        }
    }

    /// Nested array at string key path, created along the way.
    pub fn path_mut(&mut self, path: &[&str]) -> &mut Array {
        path.iter()
            .fold(self, |array, key| array.array_mut(*key))
    }

    fn next_index(&self) -> i64 {
        self.0
            .iter()
            .filter_map(|(key, _)| match key {
                Key::Int(index) => Some(index + 1),
                Key::Str(_) => None,
            })
            .max()
            .unwrap_or(0)
            .max(0)
    }
}

impl<K, V> FromIterator<(K, V)> for Array
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut array = Array::new();
        for (key, value) in iter {
            array.insert(key, value);
        }
        array
    }
}

/// PHP file returning a single literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Value,
}

impl Document {
    pub fn new(root: impl Into<Value>) -> Self {
        Self { root: root.into() }
    }

    /// Top level array, replacing a non-array root.
    pub fn root_mut(&mut self) -> &mut Array {
        if !matches!(self.root, Value::Array(_)) {
            self.root = Value::Array(Array::new());
        }

        match &mut self.root {
            Value::Array(array) => array,
            _ => unreachable!("root was just made an array"),
        }
    }

    pub fn root(&self) -> Option<&Array> {
        self.root.as_array()
    }
}

impl FromStr for Document {
    type Err = ParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(data);
        parser.skip_trivia();
        parser.expect_keyword("<?php")?;
        parser.skip_trivia();
        parser.expect_keyword("return")?;
        let root = parser.value()?;
        parser.skip_trivia();
        parser.expect(';')?;
        parser.skip_trivia();
        if parser.eat_str("?>") {
            parser.skip_trivia();
        }
        if !parser.at_end() {
            return Err(parser.error("unexpected content after return statement"));
        }

        Ok(Self { root })
    }
}

impl Display for Document {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("<?php\nreturn ")?;
        write_value(fmt, &self.root, 0)?;
        fmt.write_str(";\n")
    }
}

fn write_value(out: &mut impl Write, value: &Value, depth: usize) -> FmtResult {
    match value {
        Value::Null => out.write_str("null"),
        Value::Bool(value) => out.write_str(if *value { "true" } else { "false" }),
        Value::Int(value) => write!(out, "{value}"),
        Value::Float(value) => write!(out, "{value:?}"),
        Value::Str(value) => write_str(out, value),
        Value::Array(array) if array.is_empty() => out.write_str("[]"),
        Value::Array(array) => {
            out.write_str("[\n")?;
            for (key, value) in array.iter() {
                for _ in 0..=depth {
                    out.write_str(INDENT)?;
                }
                match key {
                    Key::Int(index) => write!(out, "{index}")?,
                    Key::Str(key) => write_str(out, key)?,
                }
                out.write_str(" => ")?;
                write_value(out, value, depth + 1)?;
                out.write_str(",\n")?;
            }
            for _ in 0..depth {
                out.write_str(INDENT)?;
            }
            out.write_str("]")
        }
    }
}

fn write_str(out: &mut impl Write, value: &str) -> FmtResult {
    out.write_char('\'')?;
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.write_char('\\')?;
        }
        out.write_char(c)?;
    }
    out.write_char('\'')
}

struct Parser<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a str) -> Self {
        Self { data, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.data[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn eat_str(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            return true;
        }
        false
    }

    fn expect(&mut self, c: char) -> Result<()> {
        self.skip_trivia();
        match self.peek() {
            Some(next) if next == c => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(next) => Err(self.error(format!("expected {c:?}, found {next:?}"))),
            None => Err(self.error(format!("expected {c:?}, found end of input"))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let rest = self.rest();
        let matched = rest
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword));
        if !matched {
            return Err(self.error(format!("expected {keyword:?}")));
        }
        self.pos += keyword.len();
        Ok(())
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with("//") || trimmed.starts_with('#') {
                let line = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += line;
            } else if trimmed.starts_with("/*") {
                let end = trimmed.find("*/").map_or(trimmed.len(), |end| end + 2);
                self.pos += end;
            } else {
                break;
            }
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_trivia();
        match self.peek() {
            Some('\'') => self.single_quoted().map(Value::Str),
            Some('"') => self.double_quoted().map(Value::Str),
            Some('[') => {
                self.bump();
                self.array(']').map(Value::Array)
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let word = self.word();
                match word.to_ascii_lowercase().as_str() {
                    "null" => Ok(Value::Null),
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "array" => {
                        self.expect('(')?;
                        self.array(')').map(Value::Array)
                    }
                    _ => Err(self.error(format!("unsupported expression {word:?}"))),
                }
            }
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn array(&mut self, close: char) -> Result<Array> {
        let mut array = Array::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(array);
            }

            let first = self.value()?;
            self.skip_trivia();
            let (key, value) = if self.eat_str("=>") {
                let key = match first {
                    Value::Int(index) => Key::Int(index),
                    Value::Str(key) => match key.parse::<i64>() {
                        // PHP casts canonical decimal string keys to integers.
                        Ok(index) if index.to_string() == key => Key::Int(index),
                        _ => Key::Str(key),
                    },
                    Value::Bool(value) => Key::Int(value as i64),
                    Value::Null => Key::Str(String::new()),
                    _ => return Err(self.error("invalid array key")),
                };
                (key, self.value()?)
            } else {
                (Key::Int(array.next_index()), first)
            };
            array.insert(key, value);

            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {}
                Some(c) => return Err(self.error(format!("expected ',' or {close:?}, found {c:?}"))),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn word(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        &self.data[start..self.pos]
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_'))
        {
            let c = self.bump();
            if matches!(c, Some('e' | 'E')) && matches!(self.peek(), Some('-' | '+')) {
                self.bump();
            }
        }

        let text = self.data[start..self.pos].replace('_', "");
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Value::Int(value));
        }
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ParseError {
                offset: start,
                message: format!("invalid number {text:?}"),
            })
    }

    fn single_quoted(&mut self) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\'') => return Ok(out),
                Some('\\') => match self.peek() {
                    Some(c @ ('\'' | '\\')) => {
                        self.bump();
                        out.push(c);
                    }
                    _ => out.push('\\'),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn double_quoted(&mut self) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('$') if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '{') => {
                    return Err(self.error("string interpolation is not supported"));
                }
                Some('\\') => out.push_str(&self.escape()?),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    /// Decode escape sequence after a backslash in a double quoted string.
    ///
    /// Unknown sequences are kept verbatim, backslash included.
    fn escape(&mut self) -> Result<String> {
        let after = self.rest().get(1..).unwrap_or_default();
        let decoded = match self.peek() {
            Some('x') if after.starts_with(|c: char| c.is_ascii_hexdigit()) => {
                self.bump();
                let digits = self.digits(2, 16);
                self.byte(digits, 16)?
            }
            Some('0'..='7') => {
                let digits = self.digits(3, 8);
                self.byte(digits, 8)?
            }
            Some('u') if after.starts_with('{') => {
                self.pos += 2;
                let rest = self.rest();
                let end = rest
                    .find('}')
                    .ok_or_else(|| self.error("unterminated unicode escape"))?;
                let c = u32::from_str_radix(&rest[..end], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid unicode escape"))?;
                self.pos += end + 1;
                c
            }
            Some(c @ ('n' | 't' | 'r' | 'v' | 'e' | 'f' | '\\' | '"' | '$')) => {
                self.bump();
                match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'v' => '\u{0b}',
                    'e' => '\u{1b}',
                    'f' => '\u{0c}',
                    other => other,
                }
            }
            _ => return Ok("\\".into()),
        };

        Ok(decoded.to_string())
    }

    fn digits(&mut self, max: usize, radix: u32) -> &'a str {
        let rest = self.rest();
        let len = rest
            .chars()
            .take(max)
            .take_while(|c| c.is_digit(radix))
            .count();
        self.pos += len;
        &rest[..len]
    }

    // Only ASCII byte escapes map onto a char.
    fn byte(&self, digits: &str, radix: u32) -> Result<char> {
        match u32::from_str_radix(digits, radix) {
            Ok(value) if value < 0x80 => char::from_u32(value)
                .ok_or_else(|| self.error("invalid byte escape")),
            _ => Err(self.error(format!("unsupported non-ASCII byte escape {digits:?}"))),
        }
    }
}

/// Literal could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at byte {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

/// Friendly result alias :3
pub type Result<T, E = ParseError> = std::result::Result<T, E>;
