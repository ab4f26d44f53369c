//! Flattened, validated stage sequences ready for scheduling.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::context::CommandContext;
use crate::error::CommandError;
use crate::node::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Source-rewriting stages remain before the executable one.
    Modify,
    Execute,
}

/// A parsed command as a list of modifier stages followed by one executable
/// stage. Never empty, immutable once built.
pub struct ContextChain<S> {
    modifiers: Arc<[CommandContext<S>]>,
    executable: CommandContext<S>,
}

impl<S: Clone> Clone for ContextChain<S> {
    fn clone(&self) -> Self {
        Self {
            modifiers: Arc::clone(&self.modifiers),
            executable: self.executable.clone(),
        }
    }
}

impl<S: Clone> ContextChain<S> {
    /// Linearise the child links of `root`. `None` when the last stage has
    /// nothing to execute.
    pub fn try_flatten(root: &CommandContext<S>) -> Option<Self> {
        let mut modifiers = Vec::new();
        let mut current = root;
        loop {
            match current.child() {
                Some(child) => {
                    modifiers.push(current.clone());
                    current = child;
                }
                None => {
                    if current.command().is_none() {
                        return None;
                    }
                    return Some(Self {
                        modifiers: modifiers.into(),
                        executable: current.clone(),
                    });
                }
            }
        }
    }

    pub fn stage(&self) -> Stage {
        if self.modifiers.is_empty() {
            Stage::Execute
        } else {
            Stage::Modify
        }
    }

    pub fn top_context(&self) -> &CommandContext<S> {
        self.modifiers.first().unwrap_or(&self.executable)
    }

    /// The chain without its first modifier stage.
    pub fn next_stage(&self) -> Option<Self> {
        if self.modifiers.is_empty() {
            return None;
        }
        Some(Self {
            modifiers: self.modifiers[1..].into(),
            executable: self.executable.clone(),
        })
    }

    pub fn executable(&self) -> &CommandContext<S> {
        &self.executable
    }

    pub fn len(&self) -> usize {
        self.modifiers.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Apply a modifier stage to one source. Stages without a modifier pass the
/// source through unchanged.
pub fn run_modifier<S: Clone>(modifier: &CommandContext<S>, source: &S) -> Result<Vec<S>, CommandError> {
    let Some(apply) = modifier.modifier() else {
        return Ok(vec![source.clone()]);
    };
    let context = modifier.copy_for(source.clone());
    match catch_unwind(AssertUnwindSafe(|| apply(&context))) {
        Ok(result) => result,
        Err(_) => {
            error!(input = context.input(), "source modifier panicked");
            Err(CommandError::failure("An unexpected error occurred trying to execute that command"))
        }
    }
}

/// Run the executable stage of a simple command for one source.
pub fn run_simple<S: Clone>(executable: &CommandContext<S>, source: &S) -> Result<i32, CommandError> {
    let context = executable.copy_for(source.clone());
    let Some(Command::Simple(action)) = context.command() else {
        return Err(CommandError::failure("Unknown or incomplete command"));
    };
    let action = Arc::clone(action);
    match catch_unwind(AssertUnwindSafe(|| action(&context))) {
        Ok(result) => result,
        Err(_) => {
            error!(input = context.input(), "command action panicked");
            Err(CommandError::failure("An unexpected error occurred trying to execute that command"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::literal;
    use crate::dispatcher::CommandDispatcher;
    use crate::node::NodeId;

    fn dispatcher() -> CommandDispatcher<u8> {
        let mut dispatcher = CommandDispatcher::<u8>::new();
        let execute = dispatcher.register(literal("execute")).unwrap();
        dispatcher
            .register(
                literal("execute")
                    .then(literal("run").redirect(NodeId::ROOT))
                    .then(literal("twice").fork(execute, |ctx| Ok(vec![*ctx.source(); 2]))),
            )
            .unwrap();
        dispatcher.register(literal("noop").executes(|_| Ok(3))).unwrap();
        dispatcher.register(literal("group")).unwrap();
        dispatcher
    }

    #[test]
    fn flattening_linearises_redirect_children() {
        let dispatcher = dispatcher();
        let parse = dispatcher.parse("execute twice run noop", 0);
        assert!(parse.validate().is_ok());
        let chain = ContextChain::try_flatten(&parse.context.build("execute twice run noop")).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.stage(), Stage::Modify);
        assert!(chain.top_context().is_forked());

        let second = chain.next_stage().unwrap();
        assert!(second.top_context().modifier().is_none());
        let last = second.next_stage().unwrap();
        assert_eq!(last.stage(), Stage::Execute);
        assert!(last.next_stage().is_none());
        assert_eq!(run_simple(last.executable(), &9).unwrap(), 3);
    }

    #[test]
    fn flattening_rejects_chains_without_a_command() {
        let dispatcher = dispatcher();
        let parse = dispatcher.parse("group", 0);
        assert!(parse.validate().is_ok());
        assert!(ContextChain::try_flatten(&parse.context.build("group")).is_none());

        let parse = dispatcher.parse("execute run ", 0);
        assert!(ContextChain::try_flatten(&parse.context.build("execute run ")).is_none());
    }

    #[test]
    fn modifiers_fan_out_sources() {
        let dispatcher = dispatcher();
        let parse = dispatcher.parse("execute twice run noop", 7);
        let chain = ContextChain::try_flatten(&parse.context.build("execute twice run noop")).unwrap();
        assert_eq!(run_modifier(chain.top_context(), &7).unwrap(), vec![7, 7]);
    }
}
