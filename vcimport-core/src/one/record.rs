//! Target record text format
//!
//! Records are ordered `KEY="value"` lines. Vector attributes group
//! sub-attributes in brackets and are not quoted at the top level:
//!
//! ```text
//! NAME="VM Network - Cluster1"
//! AR=[TYPE="IP4",SIZE="255"]
//! ```
//!
//! Double quotes and backslashes inside values are escaped with a
//! backslash.

use std::fmt;

use thiserror::Error;

/// Value of one record attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValue {
    /// Single quoted value
    Scalar(String),
    /// Bracketed list of sub-attributes
    Vector(Vec<(String, String)>),
}

/// Error raised while reading record text back
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid record text at byte {offset}: {reason}")]
pub struct RecordParseError {
    /// Byte offset of the failure
    pub offset: usize,
    /// What was expected
    pub reason: String,
}

/// An ordered record ready for the target system's allocate call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRecord {
    entries: Vec<(String, RecordValue)>,
}

impl TargetRecord {
    /// Creates an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scalar attribute
    pub fn push(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.entries
            .push((key.to_string(), RecordValue::Scalar(value.into())));
        self
    }

    /// Appends a vector attribute
    pub fn push_vector<K, V>(&mut self, key: &str, items: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let items = items
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.entries
            .push((key.to_string(), RecordValue::Vector(items)));
        self
    }

    /// Builder form of [`push`](Self::push)
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Appends all entries of another record
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Returns the first scalar value of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|(k, v)| match v {
            RecordValue::Scalar(s) if k == key => Some(s.as_str()),
            _ => None,
        })
    }

    /// Returns the sub-attributes of every vector named `key`
    #[must_use]
    pub fn vectors(&self, key: &str) -> Vec<&[(String, String)]> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match v {
                RecordValue::Vector(items) if k == key => Some(items.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Returns true if any entry is named `key`
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// All entries in insertion order
    #[must_use]
    pub fn entries(&self) -> &[(String, RecordValue)] {
        &self.entries
    }

    /// Returns true if the record has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the record text
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            match value {
                RecordValue::Scalar(s) => push_quoted(&mut out, s),
                RecordValue::Vector(items) => {
                    out.push('[');
                    for (i, (k, v)) in items.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        out.push_str(k);
                        out.push('=');
                        push_quoted(&mut out, v);
                    }
                    out.push(']');
                }
            }
            out.push('\n');
        }
        out
    }

    /// Parses record text
    ///
    /// Accepts the rendered format plus unquoted scalars (up to the end of
    /// the line) and arbitrary whitespace between entries.
    ///
    /// # Errors
    ///
    /// Returns `RecordParseError` on malformed text.
    pub fn parse(text: &str) -> Result<Self, RecordParseError> {
        let mut parser = Parser { text, pos: 0 };
        let mut record = Self::new();

        loop {
            parser.skip_whitespace();
            if parser.at_end() {
                return Ok(record);
            }
            let key = parser.key()?;
            parser.skip_inline_whitespace();
            parser.expect('=')?;
            parser.skip_inline_whitespace();
            let value = match parser.peek() {
                Some('[') => RecordValue::Vector(parser.vector()?),
                Some('"') => RecordValue::Scalar(parser.quoted()?),
                _ => RecordValue::Scalar(parser.bare()),
            };
            record.entries.push((key, value));
        }
    }
}

impl fmt::Display for TargetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, reason: impl Into<String>) -> RecordParseError {
        RecordParseError {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_inline_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), RecordParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of text"))),
        }
    }

    fn key(&mut self) -> Result<String, RecordParseError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected an attribute name"));
        }
        Ok(self.text[start..self.pos].to_string())
    }

    fn quoted(&mut self) -> Result<String, RecordParseError> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("dangling escape")),
                },
                Some('"') => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated quoted value")),
            }
        }
    }

    fn bare(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
        self.text[start..self.pos].trim().to_string()
    }

    fn vector(&mut self) -> Result<Vec<(String, String)>, RecordParseError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(items);
            }
            if !items.is_empty() {
                self.expect(',')?;
                self.skip_whitespace();
            }
            let key = self.key()?;
            self.skip_whitespace();
            self.expect('=')?;
            self.skip_whitespace();
            let value = if self.peek() == Some('"') {
                self.quoted()?
            } else {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ',' && c != ']') {
                    self.bump();
                }
                self.text[start..self.pos].trim().to_string()
            };
            items.push((key, value));
        }
    }
}
