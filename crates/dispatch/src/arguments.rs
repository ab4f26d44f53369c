//! Pluggable argument types and the built-in primitive ones.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::context::CommandContext;
use crate::error::{CommandError, CommandSyntaxError, SyntaxErrorKind};
use crate::reader::StringReader;
use crate::suggestion::{StringRange, SuggestionsBuilder};

/// Type-erased value bound to an argument node.
#[derive(Clone)]
pub struct ArgumentValue(Arc<dyn Any + Send + Sync>);

impl ArgumentValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ArgumentValue(..)")
    }
}

/// An argument value together with the input it was read from.
#[derive(Debug, Clone)]
pub struct ParsedArgument {
    pub range: StringRange,
    pub value: ArgumentValue,
}

/// Parser, completer and example source for one kind of argument.
pub trait ArgumentType<S>: Send + Sync + 'static {
    /// Namespaced identifier used for registration checks (`brigadier:integer`).
    fn type_key(&self) -> &'static str;

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError>;

    /// Parse with the invoking source available, for types whose accepted
    /// syntax depends on who is typing.
    fn parse_with_source(
        &self,
        reader: &mut StringReader,
        _source: &S,
    ) -> Result<ArgumentValue, CommandSyntaxError> {
        self.parse(reader)
    }

    fn list_suggestions(&self, _context: &CommandContext<S>, _builder: &mut SuggestionsBuilder) {}

    /// Sample inputs, used by ambiguity detection.
    fn examples(&self) -> Vec<String> {
        Vec::new()
    }

    /// Source to continue parsing with after this argument was read, if the
    /// value changes who or where later arguments are evaluated for.
    fn contextualize(&self, _value: &ArgumentValue, _source: &S) -> Option<S> {
        None
    }
}

/// The set of argument type keys the host knows how to serialise.
#[derive(Debug, Clone, Default)]
pub struct ArgumentTypeRegistry {
    keys: IndexSet<&'static str>,
}

impl ArgumentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the primitive types in this module.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for key in [
            BOOL_KEY, INTEGER_KEY, LONG_KEY, DOUBLE_KEY, FLOAT_KEY, STRING_KEY,
        ] {
            registry.register(key);
        }
        registry
    }

    pub fn register(&mut self, key: &'static str) -> &mut Self {
        self.keys.insert(key);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.keys.iter().copied()
    }
}

const BOOL_KEY: &str = "brigadier:bool";
const INTEGER_KEY: &str = "brigadier:integer";
const LONG_KEY: &str = "brigadier:long";
const DOUBLE_KEY: &str = "brigadier:double";
const FLOAT_KEY: &str = "brigadier:float";
const STRING_KEY: &str = "brigadier:string";

fn to_strings(examples: &[&str]) -> Vec<String> {
    examples.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoolArgumentType;

impl<S> ArgumentType<S> for BoolArgumentType {
    fn type_key(&self) -> &'static str {
        BOOL_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        reader.read_boolean().map(ArgumentValue::new)
    }

    fn list_suggestions(&self, _context: &CommandContext<S>, builder: &mut SuggestionsBuilder) {
        let remaining = builder.remaining_lowercase().to_string();
        for candidate in ["true", "false"] {
            if candidate.starts_with(&remaining) {
                builder.suggest(candidate);
            }
        }
    }

    fn examples(&self) -> Vec<String> {
        to_strings(&["true", "false"])
    }
}

/// Bounded integer, stored as `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerArgumentType {
    pub min: i32,
    pub max: i32,
}

impl<S> ArgumentType<S> for IntegerArgumentType {
    fn type_key(&self) -> &'static str {
        INTEGER_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let value = reader.read_int()?;
        check_range(reader, start, value as i64, self.min as i64, self.max as i64)?;
        Ok(ArgumentValue::new(value))
    }

    fn examples(&self) -> Vec<String> {
        to_strings(&["0", "123", "-123"])
    }
}

/// Bounded integer, stored as `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongArgumentType {
    pub min: i64,
    pub max: i64,
}

impl<S> ArgumentType<S> for LongArgumentType {
    fn type_key(&self) -> &'static str {
        LONG_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let value = reader.read_long()?;
        check_range(reader, start, value, self.min, self.max)?;
        Ok(ArgumentValue::new(value))
    }

    fn examples(&self) -> Vec<String> {
        to_strings(&["0", "123", "-123"])
    }
}

fn check_range(
    reader: &mut StringReader,
    start: usize,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), CommandSyntaxError> {
    let kind = if value < min {
        SyntaxErrorKind::IntegerTooLow { min, found: value }
    } else if value > max {
        SyntaxErrorKind::IntegerTooHigh { max, found: value }
    } else {
        return Ok(());
    };
    reader.set_cursor(start);
    Err(CommandSyntaxError::with_context(kind, reader))
}

fn check_float_range(
    reader: &mut StringReader,
    start: usize,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), CommandSyntaxError> {
    let kind = if value < min {
        SyntaxErrorKind::DoubleTooLow { min, found: value }
    } else if value > max {
        SyntaxErrorKind::DoubleTooHigh { max, found: value }
    } else {
        return Ok(());
    };
    reader.set_cursor(start);
    Err(CommandSyntaxError::with_context(kind, reader))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleArgumentType {
    pub min: f64,
    pub max: f64,
}

impl<S> ArgumentType<S> for DoubleArgumentType {
    fn type_key(&self) -> &'static str {
        DOUBLE_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let value = reader.read_double()?;
        check_float_range(reader, start, value, self.min, self.max)?;
        Ok(ArgumentValue::new(value))
    }

    fn examples(&self) -> Vec<String> {
        to_strings(&["0", "1.2", ".5", "-1", "-.5", "-1234.56"])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatArgumentType {
    pub min: f32,
    pub max: f32,
}

impl<S> ArgumentType<S> for FloatArgumentType {
    fn type_key(&self) -> &'static str {
        FLOAT_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let value = reader.read_float()?;
        check_float_range(reader, start, value as f64, self.min as f64, self.max as f64)?;
        Ok(ArgumentValue::new(value))
    }

    fn examples(&self) -> Vec<String> {
        to_strings(&["0", "1.2", ".5", "-1", "-.5", "-1234.56"])
    }
}

/// How much input a string argument swallows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    /// One unquoted word.
    SingleWord,
    /// A word, or a quoted phrase that may contain spaces.
    QuotablePhrase,
    /// Everything up to the end of the input.
    GreedyPhrase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringArgumentType {
    pub kind: StringKind,
}

impl<S> ArgumentType<S> for StringArgumentType {
    fn type_key(&self) -> &'static str {
        STRING_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let value = match self.kind {
            StringKind::GreedyPhrase => {
                let text = reader.remaining().to_string();
                reader.set_cursor(reader.total_length());
                text
            }
            StringKind::SingleWord => reader.read_unquoted_string().to_string(),
            StringKind::QuotablePhrase => reader.read_string()?,
        };
        Ok(ArgumentValue::new(value))
    }

    fn examples(&self) -> Vec<String> {
        match self.kind {
            StringKind::SingleWord => to_strings(&["word", "words_with_underscores"]),
            StringKind::QuotablePhrase => to_strings(&["\"quoted phrase\"", "word", "\"\""]),
            StringKind::GreedyPhrase => to_strings(&["word", "words with spaces", "\"and symbols\""]),
        }
    }
}

pub fn bool() -> BoolArgumentType {
    BoolArgumentType
}

pub fn integer() -> IntegerArgumentType {
    integer_range(i32::MIN, i32::MAX)
}

pub fn integer_min(min: i32) -> IntegerArgumentType {
    integer_range(min, i32::MAX)
}

pub fn integer_range(min: i32, max: i32) -> IntegerArgumentType {
    IntegerArgumentType { min, max }
}

pub fn long() -> LongArgumentType {
    LongArgumentType {
        min: i64::MIN,
        max: i64::MAX,
    }
}

pub fn double() -> DoubleArgumentType {
    DoubleArgumentType {
        min: f64::MIN,
        max: f64::MAX,
    }
}

pub fn float_range(min: f32, max: f32) -> FloatArgumentType {
    FloatArgumentType { min, max }
}

pub fn word() -> StringArgumentType {
    StringArgumentType {
        kind: StringKind::SingleWord,
    }
}

pub fn string() -> StringArgumentType {
    StringArgumentType {
        kind: StringKind::QuotablePhrase,
    }
}

pub fn greedy_string() -> StringArgumentType {
    StringArgumentType {
        kind: StringKind::GreedyPhrase,
    }
}

fn typed<S, T: Any + Copy>(context: &CommandContext<S>, name: &str) -> Result<T, CommandError> {
    context.argument::<T>(name).copied()
}

pub fn get_bool<S>(context: &CommandContext<S>, name: &str) -> Result<bool, CommandError> {
    typed(context, name)
}

pub fn get_integer<S>(context: &CommandContext<S>, name: &str) -> Result<i32, CommandError> {
    typed(context, name)
}

pub fn get_long<S>(context: &CommandContext<S>, name: &str) -> Result<i64, CommandError> {
    typed(context, name)
}

pub fn get_double<S>(context: &CommandContext<S>, name: &str) -> Result<f64, CommandError> {
    typed(context, name)
}

pub fn get_float<S>(context: &CommandContext<S>, name: &str) -> Result<f32, CommandError> {
    typed(context, name)
}

pub fn get_string<S>(context: &CommandContext<S>, name: &str) -> Result<String, CommandError> {
    context.argument::<String>(name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ty: &dyn ArgumentType<()>, input: &str) -> Result<(ArgumentValue, usize), CommandSyntaxError> {
        let mut reader = StringReader::new(input);
        let value = ty.parse(&mut reader)?;
        Ok((value, reader.cursor()))
    }

    #[test]
    fn integer_bounds_reset_cursor_to_token_start() {
        let err = parse(&integer_range(0, 10), "11").unwrap_err();
        assert_eq!(
            err.kind(),
            &SyntaxErrorKind::IntegerTooHigh { max: 10, found: 11 }
        );
        assert_eq!(err.cursor(), Some(0));

        let (value, cursor) = parse(&integer_range(0, 10), "7 rest").unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&7));
        assert_eq!(cursor, 1);
    }

    #[test]
    fn greedy_strings_take_everything() {
        let (value, cursor) = parse(&greedy_string(), "hello world").unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello world"));
        assert_eq!(cursor, 11);
    }

    #[test]
    fn quotable_strings_accept_quotes() {
        let (value, _) = parse(&string(), "\"two words\" after").unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("two words"));
        let (value, cursor) = parse(&word(), "one two").unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("one"));
        assert_eq!(cursor, 3);
    }

    #[test]
    fn registry_knows_builtins() {
        let registry = ArgumentTypeRegistry::with_builtins();
        assert!(registry.contains("brigadier:integer"));
        assert!(!registry.contains("minecraft:entity"));
        assert_eq!(ArgumentType::<()>::type_key(&double()), "brigadier:double");
    }
}
