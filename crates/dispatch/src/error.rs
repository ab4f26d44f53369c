//! Error taxonomy for parsing, grammar construction and execution.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::node::NodeId;
use crate::reader::StringReader;

/// Characters of input kept before the error position when rendering context.
pub const CONTEXT_AMOUNT: usize = 10;

/// What went wrong while reading input against the grammar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxErrorKind {
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Incorrect argument for command")]
    UnknownArgument,
    #[error("Expected whitespace to end one argument, but found trailing data")]
    ExpectedArgumentSeparator,
    #[error("Could not parse command: {0}")]
    ParseFailure(String),
    #[error("Expected literal {0}")]
    LiteralIncorrect(String),
    #[error("Integer must not be less than {min}, found {found}")]
    IntegerTooLow { min: i64, found: i64 },
    #[error("Integer must not be more than {max}, found {found}")]
    IntegerTooHigh { max: i64, found: i64 },
    #[error("Double must not be less than {min}, found {found}")]
    DoubleTooLow { min: f64, found: f64 },
    #[error("Double must not be more than {max}, found {found}")]
    DoubleTooHigh { max: f64, found: f64 },
    #[error("Expected quote to start a string")]
    ExpectedStartOfQuote,
    #[error("Unclosed quoted string")]
    ExpectedEndOfQuote,
    #[error("Invalid escape sequence '{0}' in quoted string")]
    InvalidEscape(char),
    #[error("Invalid bool, expected true or false but found '{0}'")]
    InvalidBool(String),
    #[error("Expected bool")]
    ExpectedBool,
    #[error("Invalid integer '{0}'")]
    InvalidInt(String),
    #[error("Expected integer")]
    ExpectedInt,
    #[error("Invalid long '{0}'")]
    InvalidLong(String),
    #[error("Expected long")]
    ExpectedLong,
    #[error("Invalid double '{0}'")]
    InvalidDouble(String),
    #[error("Expected double")]
    ExpectedDouble,
    #[error("Invalid float '{0}'")]
    InvalidFloat(String),
    #[error("Expected float")]
    ExpectedFloat,
    #[error("Expected '{0}'")]
    ExpectedSymbol(char),
    /// Argument-type specific failure ("Unknown dimension", "Selector not allowed", ...).
    #[error("{0}")]
    Custom(String),
}

/// A syntax failure, optionally pinned to a position in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSyntaxError {
    kind: SyntaxErrorKind,
    input: Option<Arc<str>>,
    cursor: Option<usize>,
}

impl CommandSyntaxError {
    /// Error without input context.
    pub fn new(kind: SyntaxErrorKind) -> Self {
        Self {
            kind,
            input: None,
            cursor: None,
        }
    }

    /// Error pinned to the reader's current cursor.
    pub fn with_context(kind: SyntaxErrorKind, reader: &StringReader) -> Self {
        Self {
            kind,
            input: Some(reader.shared_string()),
            cursor: Some(reader.cursor()),
        }
    }

    /// Shorthand for an argument-type specific message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(SyntaxErrorKind::Custom(message.into()))
    }

    pub fn kind(&self) -> &SyntaxErrorKind {
        &self.kind
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The message without position information.
    pub fn raw_message(&self) -> String {
        self.kind.to_string()
    }

    /// Caret-style window into the input around the error position.
    pub fn context(&self) -> Option<ErrorContext> {
        let input = self.input.as_deref()?;
        let cursor = self.cursor?.min(input.len());
        Some(ErrorContext::new(input, cursor))
    }
}

impl fmt::Display for CommandSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let (Some(context), Some(cursor)) = (self.context(), self.cursor) {
            write!(f, " at position {cursor}: {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CommandSyntaxError {}

/// Input surrounding an error position, split for styled rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Whether input before `before` was cut off.
    pub elided: bool,
    /// Up to [`CONTEXT_AMOUNT`] bytes of input preceding the error.
    pub before: String,
    /// Input from the error position onwards; rendered in the error style.
    pub offending: String,
}

impl ErrorContext {
    fn new(input: &str, cursor: usize) -> Self {
        let mut start = cursor.saturating_sub(CONTEXT_AMOUNT);
        while !input.is_char_boundary(start) {
            start += 1;
        }
        let mut cursor = cursor;
        while !input.is_char_boundary(cursor) {
            cursor -= 1;
        }
        Self {
            elided: cursor > CONTEXT_AMOUNT,
            before: input[start..cursor].to_string(),
            offending: input[cursor..].to_string(),
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elided {
            f.write_str("...")?;
        }
        write!(f, "{}{}<--[HERE]", self.before, self.offending)
    }
}

/// Which execution budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLimit {
    /// Too many forked contexts were produced.
    ForkCount(usize),
    /// Too many stages were run for one top-level invocation.
    ChainLength(usize),
}

impl fmt::Display for ChainLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForkCount(limit) => write!(f, "Maximum number of contexts ({limit}) reached"),
            Self::ChainLength(limit) => {
                write!(f, "Command chain length limit ({limit}) reached")
            }
        }
    }
}

/// Failure of a command invocation, as seen by the scheduler and sources.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Syntax(#[from] CommandSyntaxError),
    /// Reads exactly like an unknown command.
    #[error("Unknown command")]
    PermissionDenied,
    #[error("{0}")]
    ChainLimitExceeded(ChainLimit),
    #[error("{0}")]
    ActionFailure(String),
}

impl CommandError {
    /// An action reporting failure with a user-visible message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::ActionFailure(message.into())
    }

    /// Text shown to the invoking principal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Syntax(err) => err.raw_message(),
            other => other.to_string(),
        }
    }
}

/// Structural problems in the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("cannot add children to redirected node '{0}'")]
    ChildrenOnRedirect(String),
    #[error("cannot forward node '{0}' which already has children")]
    ForwardWithChildren(String),
    #[error("redirect cycle: {0}")]
    RedirectCycle(String),
    #[error("no node with id {0}")]
    UnknownNode(NodeId),
    #[error("the root node cannot be redirected or registered as a child")]
    RootMisuse,
}
