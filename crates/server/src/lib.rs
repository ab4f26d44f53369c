#![warn(missing_docs)]
//! Server-side command layer: the concrete command source, world-aware
//! argument types, the shared grammar facade and per-session state.

pub mod arguments;
pub mod commands;
pub mod host;
pub mod output;
pub mod session;
pub mod signing;
pub mod source;

pub use commands::{argument, literal, require_level, Commands, Dispatcher};
pub use host::{CommandHost, EntitySnapshot, NullHost};
pub use output::{BufferedOutput, CommandOutput, NullOutput, TracingOutput};
pub use session::{Session, SessionTask, SuggestionPool};
pub use signing::{SignedArgument, SigningContext, TaskChainer};
pub use source::{level_permission_key, CommandSource, EntityAnchor, PermissionPolicy};
