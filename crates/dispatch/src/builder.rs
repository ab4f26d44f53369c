//! Fluent grammar construction.
//!
//! A builder describes a node and its subtree; [`CommandDispatcher::register`]
//! consumes it and produces arena nodes, after which the subtree is only
//! changed through the dispatcher's own patching calls.
//!
//! [`CommandDispatcher::register`]: crate::CommandDispatcher::register

use std::sync::Arc;

use crate::arguments::ArgumentType;
use crate::context::CommandContext;
use crate::error::{CommandError, GrammarError};
use crate::execution::ExecutionControl;
use crate::node::{Command, NodeId, RedirectModifier, Requirement, SuggestionProvider};
use crate::suggestion::SuggestionsBuilder;

pub(crate) enum BuilderKind<S> {
    Literal(String),
    Argument {
        name: String,
        ty: Arc<dyn ArgumentType<S>>,
        suggestions: Option<SuggestionProvider<S>>,
    },
}

pub struct ArgumentBuilder<S> {
    pub(crate) kind: BuilderKind<S>,
    pub(crate) children: Vec<ArgumentBuilder<S>>,
    pub(crate) requirement: Requirement<S>,
    pub(crate) command: Option<Command<S>>,
    pub(crate) target: Option<NodeId>,
    pub(crate) modifier: Option<RedirectModifier<S>>,
    pub(crate) forks: bool,
    pub(crate) error: Option<GrammarError>,
}

/// Start a literal keyword node.
pub fn literal<S: 'static>(name: impl Into<String>) -> ArgumentBuilder<S> {
    ArgumentBuilder::new(BuilderKind::Literal(name.into()))
}

/// Start a typed argument node.
pub fn argument<S: 'static, T>(name: impl Into<String>, ty: T) -> ArgumentBuilder<S>
where
    T: ArgumentType<S>,
{
    ArgumentBuilder::new(BuilderKind::Argument {
        name: name.into(),
        ty: Arc::new(ty),
        suggestions: None,
    })
}

impl<S: 'static> ArgumentBuilder<S> {
    fn new(kind: BuilderKind<S>) -> Self {
        Self {
            kind,
            children: Vec::new(),
            requirement: Requirement::Always,
            command: None,
            target: None,
            modifier: None,
            forks: false,
            error: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        match &self.kind {
            BuilderKind::Literal(literal) => literal,
            BuilderKind::Argument { name, .. } => name,
        }
    }

    pub fn then(mut self, child: ArgumentBuilder<S>) -> Self {
        if self.target.is_some() {
            let name = self.name().to_string();
            self.error.get_or_insert(GrammarError::ChildrenOnRedirect(name));
            return self;
        }
        self.children.push(child);
        self
    }

    pub fn requires(mut self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.requirement = Requirement::Predicate(Arc::new(predicate));
        self
    }

    pub fn executes(
        mut self,
        command: impl Fn(&CommandContext<S>) -> Result<i32, CommandError> + Send + Sync + 'static,
    ) -> Self {
        self.command = Some(Command::Simple(Arc::new(command)));
        self
    }

    /// Attach a composite action that can queue more work on the running scheduler.
    pub fn executes_with_control(
        mut self,
        command: impl Fn(&CommandContext<S>, &mut ExecutionControl<'_, S>) -> Result<i32, CommandError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.command = Some(Command::Control(Arc::new(command)));
        self
    }

    /// Continue parsing at `target` with the same source.
    pub fn redirect(self, target: NodeId) -> Self {
        self.forward(target, None, false)
    }

    /// Continue parsing at `target` with a source derived by `modifier`.
    pub fn redirect_with(
        self,
        target: NodeId,
        modifier: impl Fn(&CommandContext<S>) -> Result<S, CommandError> + Send + Sync + 'static,
    ) -> Self {
        let modifier: RedirectModifier<S> = Arc::new(move |ctx| modifier(ctx).map(|s| vec![s]));
        self.forward(target, Some(modifier), false)
    }

    /// Continue at `target` once for every source `modifier` produces.
    pub fn fork(
        self,
        target: NodeId,
        modifier: impl Fn(&CommandContext<S>) -> Result<Vec<S>, CommandError> + Send + Sync + 'static,
    ) -> Self {
        self.forward(target, Some(Arc::new(modifier)), true)
    }

    pub fn forward(
        mut self,
        target: NodeId,
        modifier: Option<RedirectModifier<S>>,
        forks: bool,
    ) -> Self {
        if !self.children.is_empty() {
            let name = self.name().to_string();
            self.error.get_or_insert(GrammarError::ForwardWithChildren(name));
            return self;
        }
        self.target = Some(target);
        self.modifier = modifier;
        self.forks = forks;
        self
    }

    /// Custom completions for an argument node. Ignored on literals.
    pub fn suggests(
        mut self,
        provider: impl Fn(&CommandContext<S>, &mut SuggestionsBuilder) + Send + Sync + 'static,
    ) -> Self {
        if let BuilderKind::Argument { suggestions, .. } = &mut self.kind {
            *suggestions = Some(Arc::new(provider));
        }
        self
    }
}
