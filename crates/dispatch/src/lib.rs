//! Command grammar, parser, completion and execution scheduler.
//!
//! The engine is generic over the invocation source `S`: a grammar of
//! literal and argument nodes is parsed against input text, flattened into a
//! [`ContextChain`], and run by an [`ExecutionContext`] that enforces chain
//! length and fork budgets.

pub mod arguments;
pub mod builder;
pub mod callback;
pub mod chain;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod node;
pub mod parse;
pub mod reader;
pub mod suggestion;

/// Separates tokens in command input.
pub const ARGUMENT_SEPARATOR: char = ' ';

pub use arguments::{ArgumentType, ArgumentTypeRegistry, ArgumentValue, ParsedArgument};
pub use builder::{argument, literal, ArgumentBuilder};
pub use callback::ResultCallback;
pub use chain::{ContextChain, Stage};
pub use context::{CommandContext, CommandContextBuilder, ParsedCommandNode, SuggestionContext};
pub use dispatcher::{Ambiguity, CollisionKind, CommandDispatcher, NameCollision, ValidationReport};
pub use error::{
    ChainLimit, CommandError, CommandSyntaxError, ErrorContext, GrammarError, SyntaxErrorKind,
};
pub use execution::{
    finish_parsing, report_syntax_error, ExecutionContext, ExecutionControl, ExecutionLimits,
    ExecutionSource, NoopProfiler, ProfilerSink, TracingProfiler,
};
pub use node::{Command, CommandNode, NodeId, NodeKind, Requirement};
pub use parse::ParseResults;
pub use reader::StringReader;
pub use suggestion::{StringRange, Suggestion, Suggestions, SuggestionsBuilder};
