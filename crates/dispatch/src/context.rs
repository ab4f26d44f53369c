//! Parsed invocation state: what matched, with which values, under which source.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::arguments::ParsedArgument;
use crate::error::CommandError;
use crate::node::{Command, CommandNode, NodeId, RedirectModifier};
use crate::suggestion::StringRange;

/// A node matched during parsing and the input it consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommandNode {
    pub node: NodeId,
    pub range: StringRange,
}

/// One resolved stage of a parsed command.
///
/// The `child` link is present when the stage redirected into another part of
/// the grammar; following it yields the next stage.
pub struct CommandContext<S> {
    source: S,
    input: Arc<str>,
    arguments: Arc<IndexMap<String, ParsedArgument>>,
    command: Option<Command<S>>,
    root: NodeId,
    nodes: Arc<[ParsedCommandNode]>,
    range: StringRange,
    child: Option<Arc<CommandContext<S>>>,
    modifier: Option<RedirectModifier<S>>,
    forks: bool,
}

impl<S: Clone> Clone for CommandContext<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            input: Arc::clone(&self.input),
            arguments: Arc::clone(&self.arguments),
            command: self.command.clone(),
            root: self.root,
            nodes: Arc::clone(&self.nodes),
            range: self.range,
            child: self.child.clone(),
            modifier: self.modifier.clone(),
            forks: self.forks,
        }
    }
}

impl<S: Clone> CommandContext<S> {
    /// The same stage bound to another source.
    pub fn copy_for(&self, source: S) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }
}

impl<S> CommandContext<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Typed value bound to argument `name`.
    pub fn argument<T: Any>(&self, name: &str) -> Result<&T, CommandError> {
        let parsed = self.arguments.get(name).ok_or_else(|| {
            CommandError::failure(format!("No such argument '{name}' exists on this command"))
        })?;
        parsed.value.downcast_ref::<T>().ok_or_else(|| {
            CommandError::failure(format!(
                "Argument '{name}' does not hold a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    pub fn arguments(&self) -> &IndexMap<String, ParsedArgument> {
        &self.arguments
    }

    pub fn command(&self) -> Option<&Command<S>> {
        self.command.as_ref()
    }

    pub fn root_node(&self) -> NodeId {
        self.root
    }

    pub fn nodes(&self) -> &[ParsedCommandNode] {
        &self.nodes
    }

    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn range(&self) -> StringRange {
        self.range
    }

    pub fn child(&self) -> Option<&CommandContext<S>> {
        self.child.as_deref()
    }

    pub fn last_child(&self) -> &CommandContext<S> {
        let mut result = self;
        while let Some(child) = result.child() {
            result = child;
        }
        result
    }

    pub fn modifier(&self) -> Option<&RedirectModifier<S>> {
        self.modifier.as_ref()
    }

    pub fn is_forked(&self) -> bool {
        self.forks
    }
}

/// Where completion should resume: the node whose children are candidates
/// and the input offset the candidates replace from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionContext {
    pub parent: NodeId,
    pub start_pos: usize,
}

/// Mutable accumulator used while parsing.
pub struct CommandContextBuilder<S> {
    source: S,
    root: NodeId,
    arguments: IndexMap<String, ParsedArgument>,
    nodes: Vec<ParsedCommandNode>,
    command: Option<Command<S>>,
    child: Option<Box<CommandContextBuilder<S>>>,
    range: StringRange,
    modifier: Option<RedirectModifier<S>>,
    forks: bool,
}

impl<S: Clone> Clone for CommandContextBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            root: self.root,
            arguments: self.arguments.clone(),
            nodes: self.nodes.clone(),
            command: self.command.clone(),
            child: self.child.clone(),
            range: self.range,
            modifier: self.modifier.clone(),
            forks: self.forks,
        }
    }
}

impl<S> CommandContextBuilder<S> {
    /// Input span covered by the nodes matched so far.
    pub fn range(&self) -> StringRange {
        self.range
    }
}

impl<S: Clone> CommandContextBuilder<S> {
    pub fn new(source: S, root: NodeId, start: usize) -> Self {
        Self {
            source,
            root,
            arguments: IndexMap::new(),
            nodes: Vec::new(),
            command: None,
            child: None,
            range: StringRange::at(start),
            modifier: None,
            forks: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn with_source(&mut self, source: S) -> &mut Self {
        self.source = source;
        self
    }

    pub fn root_node(&self) -> NodeId {
        self.root
    }

    pub fn with_argument(&mut self, name: impl Into<String>, argument: ParsedArgument) -> &mut Self {
        self.arguments.insert(name.into(), argument);
        self
    }

    pub fn arguments(&self) -> &IndexMap<String, ParsedArgument> {
        &self.arguments
    }

    pub fn with_command(&mut self, command: Option<Command<S>>) -> &mut Self {
        self.command = command;
        self
    }

    pub fn command(&self) -> Option<&Command<S>> {
        self.command.as_ref()
    }

    pub(crate) fn with_node(&mut self, id: NodeId, node: &CommandNode<S>, range: StringRange) -> &mut Self {
        self.nodes.push(ParsedCommandNode { node: id, range });
        self.range = StringRange::encompassing(self.range, range);
        self.modifier = node.modifier.clone();
        self.forks = node.forks;
        self
    }

    pub fn nodes(&self) -> &[ParsedCommandNode] {
        &self.nodes
    }

    pub fn with_child(&mut self, child: CommandContextBuilder<S>) -> &mut Self {
        self.child = Some(Box::new(child));
        self
    }

    pub fn child(&self) -> Option<&CommandContextBuilder<S>> {
        self.child.as_deref()
    }

    pub fn last_child(&self) -> &CommandContextBuilder<S> {
        let mut result = self;
        while let Some(child) = result.child() {
            result = child;
        }
        result
    }

    /// Freeze into a context over `input`.
    pub fn build(&self, input: &str) -> CommandContext<S> {
        self.build_shared(&Arc::from(input))
    }

    fn build_shared(&self, input: &Arc<str>) -> CommandContext<S> {
        CommandContext {
            source: self.source.clone(),
            input: Arc::clone(input),
            arguments: Arc::new(self.arguments.clone()),
            command: self.command.clone(),
            root: self.root,
            nodes: Arc::from(self.nodes.as_slice()),
            range: self.range,
            child: self
                .child
                .as_ref()
                .map(|child| Arc::new(child.build_shared(input))),
            modifier: self.modifier.clone(),
            forks: self.forks,
        }
    }

    /// Locate the node whose children complete the input at `cursor`.
    pub fn find_suggestion_context(&self, cursor: usize) -> Option<SuggestionContext> {
        if self.range.start > cursor {
            return None;
        }
        if self.range.end < cursor {
            if let Some(child) = &self.child {
                return child.find_suggestion_context(cursor);
            }
            return Some(match self.nodes.last() {
                Some(last) => SuggestionContext {
                    parent: last.node,
                    start_pos: last.range.end + 1,
                },
                None => SuggestionContext {
                    parent: self.root,
                    start_pos: self.range.start,
                },
            });
        }
        let mut prev = self.root;
        for parsed in &self.nodes {
            if parsed.range.start <= cursor && cursor <= parsed.range.end {
                return Some(SuggestionContext {
                    parent: prev,
                    start_pos: parsed.range.start,
                });
            }
            prev = parsed.node;
        }
        Some(SuggestionContext {
            parent: prev,
            start_pos: self.range.start,
        })
    }
}
