//! Grammar nodes stored in the dispatcher's arena.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::arguments::ArgumentType;
use crate::context::CommandContext;
use crate::error::CommandError;
use crate::execution::ExecutionControl;
use crate::suggestion::SuggestionsBuilder;

/// Index of a node in a [`CommandDispatcher`](crate::CommandDispatcher) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: Self = Self(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type Predicate<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;
pub type CommandFn<S> = Arc<dyn Fn(&CommandContext<S>) -> Result<i32, CommandError> + Send + Sync>;
pub type ControlFn<S> = Arc<
    dyn Fn(&CommandContext<S>, &mut ExecutionControl<'_, S>) -> Result<i32, CommandError> + Send + Sync,
>;
pub type RedirectModifier<S> =
    Arc<dyn Fn(&CommandContext<S>) -> Result<Vec<S>, CommandError> + Send + Sync>;
pub type SuggestionProvider<S> = Arc<dyn Fn(&CommandContext<S>, &mut SuggestionsBuilder) + Send + Sync>;

/// The executable action attached to a node.
pub enum Command<S> {
    /// Runs to completion and returns a result value.
    Simple(CommandFn<S>),
    /// Composite action that may queue further work on the active scheduler.
    Control(ControlFn<S>),
}

impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Simple(f) => Self::Simple(Arc::clone(f)),
            Self::Control(f) => Self::Control(Arc::clone(f)),
        }
    }
}

impl<S> fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => f.write_str("Command::Simple"),
            Self::Control(_) => f.write_str("Command::Control"),
        }
    }
}

/// Who may see and use a node.
pub enum Requirement<S> {
    Always,
    Predicate(Predicate<S>),
}

impl<S> Clone for Requirement<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Always => Self::Always,
            Self::Predicate(p) => Self::Predicate(Arc::clone(p)),
        }
    }
}

pub enum NodeKind<S> {
    Root,
    Literal {
        literal: String,
    },
    Argument {
        name: String,
        ty: Arc<dyn ArgumentType<S>>,
        suggestions: Option<SuggestionProvider<S>>,
    },
}

impl<S> Clone for NodeKind<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Root => Self::Root,
            Self::Literal { literal } => Self::Literal {
                literal: literal.clone(),
            },
            Self::Argument {
                name,
                ty,
                suggestions,
            } => Self::Argument {
                name: name.clone(),
                ty: Arc::clone(ty),
                suggestions: suggestions.clone(),
            },
        }
    }
}

/// One literal or argument slot of the grammar.
pub struct CommandNode<S> {
    pub(crate) kind: NodeKind<S>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) requirement: Requirement<S>,
    pub(crate) command: Option<Command<S>>,
    pub(crate) redirect: Option<NodeId>,
    pub(crate) modifier: Option<RedirectModifier<S>>,
    pub(crate) forks: bool,
    /// Requirement and command are taken from the redirect target.
    pub(crate) alias: bool,
    pub(crate) children: IndexMap<String, NodeId>,
    pub(crate) literals: IndexMap<String, NodeId>,
    pub(crate) arguments: IndexMap<String, NodeId>,
}

impl<S> Clone for CommandNode<S> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            parent: self.parent,
            requirement: self.requirement.clone(),
            command: self.command.clone(),
            redirect: self.redirect,
            modifier: self.modifier.clone(),
            forks: self.forks,
            alias: self.alias,
            children: self.children.clone(),
            literals: self.literals.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

impl<S> CommandNode<S> {
    pub(crate) fn new(kind: NodeKind<S>, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            requirement: Requirement::Always,
            command: None,
            redirect: None,
            modifier: None,
            forks: false,
            alias: false,
            children: IndexMap::new(),
            literals: IndexMap::new(),
            arguments: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind<S> {
        &self.kind
    }

    /// Key among siblings: the literal text or the argument name.
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Root => "",
            NodeKind::Literal { literal } => literal,
            NodeKind::Argument { name, .. } => name,
        }
    }

    pub fn usage_text(&self) -> String {
        match &self.kind {
            NodeKind::Root => String::new(),
            NodeKind::Literal { literal } => literal.clone(),
            NodeKind::Argument { name, .. } => format!("<{name}>"),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal { .. })
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.kind, NodeKind::Argument { .. })
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn redirect(&self) -> Option<NodeId> {
        self.redirect
    }

    pub fn is_fork(&self) -> bool {
        self.forks
    }

    pub fn is_alias(&self) -> bool {
        self.alias
    }

    pub fn has_own_command(&self) -> bool {
        self.command.is_some()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }
}

impl<S: 'static> CommandNode<S> {
    /// Sample inputs this node accepts.
    pub fn examples(&self) -> Vec<String> {
        match &self.kind {
            NodeKind::Root => Vec::new(),
            NodeKind::Literal { literal } => vec![literal.clone()],
            NodeKind::Argument { ty, .. } => ty.examples(),
        }
    }
}

/// Whether `literal` matches the input at the reader cursor, followed by the
/// end of input or a separator.
pub(crate) fn literal_end(literal: &str, remaining: &str) -> Option<usize> {
    let rest = remaining.strip_prefix(literal)?;
    if rest.is_empty() || rest.starts_with(crate::ARGUMENT_SEPARATOR) {
        Some(literal.len())
    } else {
        None
    }
}
