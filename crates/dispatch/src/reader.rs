//! Cursor over command input.

use std::sync::Arc;

use crate::error::{CommandSyntaxError, SyntaxErrorKind};

const SYNTAX_ESCAPE: char = '\\';
const SYNTAX_DOUBLE_QUOTE: char = '"';
const SYNTAX_SINGLE_QUOTE: char = '\'';

/// Byte-cursor reader over a shared input string.
///
/// Cloning is cheap: the input is shared and only the cursor is copied, which
/// lets the parser try several children from the same position.
#[derive(Debug, Clone)]
pub struct StringReader {
    string: Arc<str>,
    cursor: usize,
}

impl StringReader {
    pub fn new(input: impl Into<Arc<str>>) -> Self {
        Self {
            string: input.into(),
            cursor: 0,
        }
    }

    pub fn with_cursor(input: impl Into<Arc<str>>, cursor: usize) -> Self {
        let mut reader = Self::new(input);
        reader.set_cursor(cursor);
        reader
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    pub(crate) fn shared_string(&self) -> Arc<str> {
        Arc::clone(&self.string)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamped to the input length and snapped back to the
    /// start of the character it lands in.
    pub fn set_cursor(&mut self, cursor: usize) {
        let mut cursor = cursor.min(self.string.len());
        while !self.string.is_char_boundary(cursor) {
            cursor -= 1;
        }
        self.cursor = cursor;
    }

    pub fn total_length(&self) -> usize {
        self.string.len()
    }

    pub fn remaining_length(&self) -> usize {
        self.string.len() - self.cursor
    }

    pub fn read_so_far(&self) -> &str {
        &self.string[..self.cursor]
    }

    pub fn remaining(&self) -> &str {
        &self.string[self.cursor..]
    }

    pub fn can_read_n(&self, length: usize) -> bool {
        self.cursor + length <= self.string.len()
    }

    pub fn can_read(&self) -> bool {
        self.can_read_n(1)
    }

    /// Character under the cursor, if any.
    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Character `offset` characters past the cursor.
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    pub fn read(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    pub fn skip(&mut self) {
        if let Some(c) = self.peek() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.skip();
        }
    }

    fn error(&self, kind: SyntaxErrorKind) -> CommandSyntaxError {
        CommandSyntaxError::with_context(kind, self)
    }

    pub fn is_allowed_number(c: char) -> bool {
        c.is_ascii_digit() || c == '.' || c == '-'
    }

    pub fn is_allowed_in_unquoted_string(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
    }

    pub fn is_quoted_string_start(c: char) -> bool {
        c == SYNTAX_DOUBLE_QUOTE || c == SYNTAX_SINGLE_QUOTE
    }

    fn read_number<T: std::str::FromStr>(
        &mut self,
        expected: SyntaxErrorKind,
        invalid: fn(String) -> SyntaxErrorKind,
    ) -> Result<T, CommandSyntaxError> {
        let start = self.cursor;
        while self.peek().is_some_and(Self::is_allowed_number) {
            self.skip();
        }
        let number = &self.string[start..self.cursor];
        if number.is_empty() {
            return Err(self.error(expected));
        }
        match number.parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                let number = number.to_string();
                self.cursor = start;
                Err(self.error(invalid(number)))
            }
        }
    }

    pub fn read_int(&mut self) -> Result<i32, CommandSyntaxError> {
        self.read_number(SyntaxErrorKind::ExpectedInt, SyntaxErrorKind::InvalidInt)
    }

    pub fn read_long(&mut self) -> Result<i64, CommandSyntaxError> {
        self.read_number(SyntaxErrorKind::ExpectedLong, SyntaxErrorKind::InvalidLong)
    }

    pub fn read_double(&mut self) -> Result<f64, CommandSyntaxError> {
        self.read_number(SyntaxErrorKind::ExpectedDouble, SyntaxErrorKind::InvalidDouble)
    }

    pub fn read_float(&mut self) -> Result<f32, CommandSyntaxError> {
        self.read_number(SyntaxErrorKind::ExpectedFloat, SyntaxErrorKind::InvalidFloat)
    }

    pub fn read_unquoted_string(&mut self) -> &str {
        let start = self.cursor;
        while self.peek().is_some_and(Self::is_allowed_in_unquoted_string) {
            self.skip();
        }
        &self.string[start..self.cursor]
    }

    pub fn read_quoted_string(&mut self) -> Result<String, CommandSyntaxError> {
        let Some(next) = self.peek() else {
            return Ok(String::new());
        };
        if !Self::is_quoted_string_start(next) {
            return Err(self.error(SyntaxErrorKind::ExpectedStartOfQuote));
        }
        self.skip();
        self.read_string_until(next)
    }

    fn read_string_until(&mut self, terminator: char) -> Result<String, CommandSyntaxError> {
        let mut result = String::new();
        let mut escaped = false;
        while let Some(c) = self.read() {
            if escaped {
                if c == terminator || c == SYNTAX_ESCAPE {
                    result.push(c);
                    escaped = false;
                } else {
                    self.cursor -= c.len_utf8();
                    return Err(self.error(SyntaxErrorKind::InvalidEscape(c)));
                }
            } else if c == SYNTAX_ESCAPE {
                escaped = true;
            } else if c == terminator {
                return Ok(result);
            } else {
                result.push(c);
            }
        }
        Err(self.error(SyntaxErrorKind::ExpectedEndOfQuote))
    }

    /// Quoted string when the next character opens a quote, otherwise an unquoted word.
    pub fn read_string(&mut self) -> Result<String, CommandSyntaxError> {
        match self.peek() {
            None => Ok(String::new()),
            Some(c) if Self::is_quoted_string_start(c) => {
                self.skip();
                self.read_string_until(c)
            }
            Some(_) => Ok(self.read_unquoted_string().to_string()),
        }
    }

    pub fn read_boolean(&mut self) -> Result<bool, CommandSyntaxError> {
        let start = self.cursor;
        let value = self.read_string()?;
        if value.is_empty() {
            return Err(self.error(SyntaxErrorKind::ExpectedBool));
        }
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => {
                self.cursor = start;
                Err(self.error(SyntaxErrorKind::InvalidBool(value)))
            }
        }
    }

    pub fn expect(&mut self, c: char) -> Result<(), CommandSyntaxError> {
        if self.peek() != Some(c) {
            return Err(self.error(SyntaxErrorKind::ExpectedSymbol(c)));
        }
        self.skip();
        Ok(())
    }
}
