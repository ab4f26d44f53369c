//! Shared command grammar for every source on a server.

use std::sync::{Arc, RwLock};

use mdcommand_dispatch::{
    ArgumentBuilder, ArgumentType, ArgumentTypeRegistry, CommandDispatcher, ExecutionContext,
    ExecutionLimits, ExecutionSource, ParseResults, ResultCallback, Suggestions, ValidationReport,
};
use tracing::{debug, warn};

use crate::arguments::register_domain_types;
use crate::source::CommandSource;

/// Grammar snapshot type handed to sessions and executors.
pub type Dispatcher = CommandDispatcher<CommandSource>;

/// Literal node of the server grammar.
pub fn literal(name: impl Into<String>) -> ArgumentBuilder<CommandSource> {
    mdcommand_dispatch::literal(name)
}

/// Typed argument node of the server grammar.
pub fn argument<T>(name: impl Into<String>, ty: T) -> ArgumentBuilder<CommandSource>
where
    T: ArgumentType<CommandSource>,
{
    mdcommand_dispatch::argument(name, ty)
}

/// Requirement predicate: source holds at least `level`.
pub fn require_level(level: i32) -> impl Fn(&CommandSource) -> bool + Send + Sync + 'static {
    move |source: &CommandSource| source.has_permission(level)
}

/// Owns the live grammar and the limits every invocation runs under.
///
/// Readers take an `Arc` snapshot, so a grammar update never disturbs a
/// command that is already parsing or executing.
pub struct Commands {
    dispatcher: RwLock<Arc<Dispatcher>>,
    limits: ExecutionLimits,
    registry: ArgumentTypeRegistry,
}

impl Commands {
    /// Empty grammar that knows the built-in and world argument types.
    pub fn new(limits: ExecutionLimits) -> Self {
        let mut registry = ArgumentTypeRegistry::with_builtins();
        register_domain_types(&mut registry);
        Self {
            dispatcher: RwLock::new(Arc::new(Dispatcher::new())),
            limits,
            registry,
        }
    }

    /// Limits applied to each top-level invocation.
    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Argument type keys the grammar may use.
    pub fn registry(&self) -> &ArgumentTypeRegistry {
        &self.registry
    }

    /// Current grammar.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher.read().unwrap_or_else(|p| p.into_inner()))
    }

    /// Mutate the grammar. Snapshots already handed out are unaffected.
    pub fn update<R>(&self, f: impl FnOnce(&mut Dispatcher) -> R) -> R {
        let mut guard = self.dispatcher.write().unwrap_or_else(|p| p.into_inner());
        f(Arc::make_mut(&mut guard))
    }

    /// Parse without executing.
    pub fn parse(&self, input: &str, source: &CommandSource) -> ParseResults<CommandSource> {
        self.dispatcher().parse(strip_slash(input), source.clone())
    }

    /// Run `input` for `source` in a fresh scheduler.
    ///
    /// Returns whether the command parsed and was queued. Results reach the
    /// source's callback; feedback reaches its output.
    pub fn perform_command(&self, input: &str, source: &CommandSource) -> bool {
        self.perform_in(None, input, source)
    }

    /// Run `input` inside `active` when given, sharing its budgets.
    pub fn perform_in(
        &self,
        active: Option<&mut ExecutionContext<CommandSource>>,
        input: &str,
        source: &CommandSource,
    ) -> bool {
        let input = strip_slash(input);
        debug!(source = source.text_name(), "perform '{}'", input);
        let dispatcher = self.dispatcher();
        let mut queued = false;
        ExecutionContext::execute_in_context(active, &dispatcher, self.limits, |context| {
            queued = context.queue_command(input, source, ResultCallback::EMPTY);
        });
        if !queued {
            source.callback().on_failure();
        }
        queued
    }

    /// Completions for `input` with the cursor at its end.
    ///
    /// A leading `/` is skipped, and the returned ranges index `input` as given.
    pub fn suggestions(&self, input: &str, source: &CommandSource) -> Suggestions {
        let command = strip_slash(input);
        let dispatcher = self.dispatcher();
        let parse = dispatcher.parse(command, source.clone());
        dispatcher
            .get_completion_suggestions(&parse)
            .shifted(input.len() - command.len())
    }

    /// Completion-only copy of the grammar restricted to `source`.
    pub fn build_suggestion_tree(&self, source: &CommandSource) -> Dispatcher {
        self.dispatcher().project_for(source)
    }

    /// Startup self-check. Problems are logged as well as returned.
    pub fn validate(&self) -> ValidationReport {
        let report = self.dispatcher().validate(&self.registry);
        for line in report.lines() {
            warn!("command grammar: {}", line);
        }
        report
    }
}

impl Default for Commands {
    fn default() -> Self {
        Self::new(ExecutionLimits::default())
    }
}

pub(crate) fn strip_slash(input: &str) -> &str {
    input.strip_prefix('/').unwrap_or(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::output::BufferedOutput;
    use mdcommand_dispatch::StringRange;

    fn console(level: i32) -> (CommandSource, Arc<BufferedOutput>) {
        let output = Arc::new(BufferedOutput::new());
        let source = CommandSource::new("Console", Arc::new(NullHost), output.clone())
            .with_permission(level);
        (source, output)
    }

    #[test]
    fn updates_do_not_touch_existing_snapshots() {
        let commands = Commands::default();
        let before = commands.dispatcher();
        commands
            .update(|d| d.register(literal("ping").executes(|_| Ok(1))))
            .unwrap();
        assert!(before.is_empty());
        assert!(!commands.dispatcher().is_empty());
    }

    #[test]
    fn leading_slash_is_ignored() {
        let commands = Commands::default();
        commands
            .update(|d| {
                d.register(literal("ping").executes(|ctx| {
                    ctx.source().send_success("pong", false);
                    Ok(1)
                }))
            })
            .unwrap();
        let (source, output) = console(4);
        assert!(commands.perform_command("/ping", &source));
        assert!(!commands.perform_command("pong", &source));
        assert_eq!(output.take_lines()[0], "pong");
    }

    #[test]
    fn slash_prefixed_input_completes_like_bare_input() {
        let commands = Commands::default();
        commands
            .update(|d| d.register(literal("tp").then(literal("Alex").executes(|_| Ok(1)))))
            .unwrap();
        let (source, _) = console(4);

        let bare = commands.suggestions("tp Al", &source);
        assert_eq!(bare.texts(), vec!["Alex"]);
        assert_eq!(bare.range, StringRange::between(3, 5));

        let slashed = commands.suggestions("/tp Al", &source);
        assert_eq!(slashed.texts(), vec!["Alex"]);
        assert_eq!(slashed.range, StringRange::between(4, 6));
        assert_eq!(slashed.list[0].apply("/tp Al"), "/tp Alex");
    }

    #[test]
    fn requirements_gate_execution_and_suggestions() {
        let commands = Commands::default();
        commands
            .update(|d| d.register(literal("stop").requires(require_level(4)).executes(|_| Ok(1))))
            .unwrap();
        let (low, output) = console(1);
        assert!(!commands.perform_command("stop", &low));
        assert_eq!(output.take_lines()[0], "Unknown command");
        assert!(commands.suggestions("", &low).is_empty());

        let (high, _) = console(4);
        assert_eq!(commands.suggestions("", &high).texts(), vec!["stop"]);
        assert_eq!(commands.build_suggestion_tree(&low).len(), 1);
    }
}
