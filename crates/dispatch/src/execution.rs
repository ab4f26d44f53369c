//! The execution scheduler.
//!
//! One [`ExecutionContext`] drives a top-level invocation to completion. Work
//! is kept on an explicit queue instead of the call stack: running an entry
//! may produce more entries, which are pushed to the front of the queue in
//! the order they were produced, so every fork is finished depth-first
//! before its siblings continue.
//!
//! Composite actions never start a second scheduler. They receive an
//! [`ExecutionControl`] handle for the active one and queue their work there,
//! which keeps the chain-length and fork budgets shared across the whole
//! invocation.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, trace};

use crate::callback::ResultCallback;
use crate::chain::{run_modifier, run_simple, ContextChain, Stage};
use crate::context::CommandContext;
use crate::dispatcher::CommandDispatcher;
use crate::error::{ChainLimit, CommandError, CommandSyntaxError, SyntaxErrorKind};
use crate::node::{Command, ControlFn};
use crate::parse::ParseResults;

/// Pending entries beyond which a run is abandoned.
pub const MAX_QUEUE_DEPTH: usize = 10_000_000;

/// What the scheduler needs from an invocation context.
pub trait ExecutionSource: Clone + Send + Sync + 'static {
    fn callback(&self) -> ResultCallback;

    /// The same source reporting to `callback` instead.
    fn with_callback(&self, callback: ResultCallback) -> Self;

    /// User-visible failure text.
    fn send_failure(&self, message: &str);

    fn handle_error(&self, error: &CommandError) {
        self.send_failure(&error.user_message());
    }
}

/// Section timing hooks around scheduler work.
pub trait ProfilerSink: Send {
    fn push(&mut self, section: &str);
    fn pop(&mut self);
}

#[derive(Debug, Default)]
pub struct NoopProfiler;

impl ProfilerSink for NoopProfiler {
    fn push(&mut self, _section: &str) {}
    fn pop(&mut self) {}
}

/// Emits one `trace!` event per finished section with its duration.
#[derive(Debug, Default)]
pub struct TracingProfiler {
    stack: Vec<(String, Instant)>,
}

impl ProfilerSink for TracingProfiler {
    fn push(&mut self, section: &str) {
        self.stack.push((section.to_string(), Instant::now()));
    }

    fn pop(&mut self) {
        if let Some((section, started)) = self.stack.pop() {
            trace!(
                section = %section,
                depth = self.stack.len(),
                micros = started.elapsed().as_micros() as u64,
                "profiler section"
            );
        }
    }
}

/// Budgets for one top-level invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Units of work (modifier stages, simple and composite executions) one
    /// invocation may spend. Also bounds how deeply composite actions may nest.
    pub max_chain_length: usize,
    /// Forked sources one invocation may create in total.
    pub max_fork_count: usize,
    pub max_queue_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_chain_length: 65536,
            max_fork_count: 65536,
            max_queue_depth: MAX_QUEUE_DEPTH,
        }
    }
}

struct QueueEntry<S> {
    depth: usize,
    action: EntryAction<S>,
}

enum EntryAction<S> {
    /// Apply the modifier stages of a chain, then run or queue the executable stage.
    Build {
        input: Arc<str>,
        chain: ContextChain<S>,
        source: S,
    },
    /// Run a simple command for one source.
    Execute { context: CommandContext<S>, source: S },
}

/// Scheduler state for one top-level invocation.
pub struct ExecutionContext<S> {
    dispatcher: Arc<CommandDispatcher<S>>,
    limits: ExecutionLimits,
    command_quota: usize,
    forks_spawned: usize,
    queue_overflow: bool,
    queue: VecDeque<QueueEntry<S>>,
    new_top: Vec<QueueEntry<S>>,
    current_depth: usize,
    profiler: Box<dyn ProfilerSink>,
}

impl<S: ExecutionSource> ExecutionContext<S> {
    pub fn new(dispatcher: Arc<CommandDispatcher<S>>, limits: ExecutionLimits) -> Self {
        Self {
            dispatcher,
            limits,
            command_quota: limits.max_chain_length,
            forks_spawned: 0,
            queue_overflow: false,
            queue: VecDeque::new(),
            new_top: Vec::new(),
            current_depth: 0,
            profiler: Box::new(NoopProfiler),
        }
    }

    pub fn with_profiler(mut self, profiler: impl ProfilerSink + 'static) -> Self {
        self.profiler = Box::new(profiler);
        self
    }

    /// Run `f` against the active scheduler if there is one; otherwise create
    /// one, run `f`, and drain it before returning.
    pub fn execute_in_context(
        active: Option<&mut ExecutionContext<S>>,
        dispatcher: &Arc<CommandDispatcher<S>>,
        limits: ExecutionLimits,
        f: impl FnOnce(&mut ExecutionContext<S>),
    ) {
        match active {
            Some(context) => f(context),
            None => {
                let mut context = ExecutionContext::new(Arc::clone(dispatcher), limits);
                f(&mut context);
                context.run_command_queue();
            }
        }
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher<S>> {
        &self.dispatcher
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    pub fn remaining_quota(&self) -> usize {
        self.command_quota
    }

    pub fn forks_spawned(&self) -> usize {
        self.forks_spawned
    }

    pub fn pending(&self) -> usize {
        self.queue.len() + self.new_top.len()
    }

    /// Seed the queue with a parsed chain. `callback` observes the outcome in
    /// addition to the source's own callback.
    pub fn queue_initial_command_execution(
        &mut self,
        input: &str,
        chain: ContextChain<S>,
        source: &S,
        callback: ResultCallback,
    ) {
        let source = source.with_callback(ResultCallback::chain(&source.callback(), &callback));
        self.queue_next(QueueEntry {
            depth: self.current_depth,
            action: EntryAction::Build {
                input: Arc::from(input),
                chain,
                source,
            },
        });
    }

    /// Parse `input` and queue it. Syntax errors are reported to `source`
    /// and nothing is queued.
    pub fn queue_command(&mut self, input: &str, source: &S, callback: ResultCallback) -> bool {
        let parse = self.dispatcher.parse(input, source.clone());
        match finish_parsing(&parse, input, source) {
            Some(chain) => {
                self.queue_initial_command_execution(input, chain, source, callback);
                true
            }
            None => {
                callback.on_failure();
                false
            }
        }
    }

    fn queue_next(&mut self, entry: QueueEntry<S>) {
        if self.pending() >= self.limits.max_queue_depth {
            self.queue_overflow = true;
        }
        if !self.queue_overflow {
            self.new_top.push(entry);
        }
    }

    fn push_new_commands(&mut self) {
        for entry in self.new_top.drain(..).rev() {
            self.queue.push_front(entry);
        }
    }

    /// Drain the queue. Returns once every entry has run or the queue overflowed.
    pub fn run_command_queue(&mut self) {
        self.push_new_commands();
        while let Some(entry) = self.queue.pop_front() {
            self.current_depth = entry.depth;
            trace!(depth = entry.depth, pending = self.queue.len(), "running queue entry");
            match entry.action {
                EntryAction::Build {
                    input,
                    chain,
                    source,
                } => self.build_contexts(entry.depth, &input, chain, source),
                EntryAction::Execute { context, source } => self.execute_command(&context, source),
            }
            if self.queue_overflow {
                error!(
                    limit = self.limits.max_queue_depth,
                    "command execution stopped: too many pending commands"
                );
                self.queue.clear();
                self.new_top.clear();
                return;
            }
            self.push_new_commands();
        }
    }

    fn try_charge(&mut self) -> bool {
        if self.command_quota == 0 {
            return false;
        }
        self.command_quota -= 1;
        true
    }

    fn reject_for_chain_length(&self, sources: &[S], input: &str) {
        let limit = self.limits.max_chain_length;
        info!(input, limit, "command execution stopped due to chain length limit");
        let err = CommandError::ChainLimitExceeded(ChainLimit::ChainLength(limit));
        for source in sources {
            source.callback().on_failure();
            source.handle_error(&err);
        }
    }

    fn build_contexts(&mut self, depth: usize, input: &str, chain: ContextChain<S>, original: S) {
        let mut chain = chain;
        let mut sources = vec![original.clone()];
        let mut forked = false;

        self.profiler.push(&format!("prepare {input}"));
        while chain.stage() == Stage::Modify {
            let top = chain.top_context().clone();
            forked |= top.is_forked();
            if top.modifier().is_some() {
                if !self.try_charge() {
                    self.reject_for_chain_length(&sources, input);
                    self.profiler.pop();
                    return;
                }
                let mut next = Vec::new();
                let mut rejected = 0usize;
                for source in &sources {
                    match run_modifier(&top, source) {
                        Ok(produced) => {
                            for derived in produced {
                                if top.is_forked() {
                                    if self.forks_spawned >= self.limits.max_fork_count {
                                        derived.callback().on_failure();
                                        rejected += 1;
                                        continue;
                                    }
                                    self.forks_spawned += 1;
                                }
                                next.push(derived);
                            }
                        }
                        Err(err) => {
                            source.callback().on_failure();
                            source.handle_error(&err);
                            if !forked {
                                self.profiler.pop();
                                return;
                            }
                        }
                    }
                }
                if rejected > 0 {
                    let limit = self.limits.max_fork_count;
                    info!(input, rejected, limit, "fork limit reached");
                    original.handle_error(&CommandError::ChainLimitExceeded(ChainLimit::ForkCount(limit)));
                }
                sources = next;
            }
            match chain.next_stage() {
                Some(next) => chain = next,
                None => break,
            }
        }
        self.profiler.pop();

        if sources.is_empty() {
            trace!(input, "no sources left after modifiers");
            return;
        }
        let executable = chain.top_context().clone();
        match executable.command().cloned() {
            Some(Command::Control(action)) => {
                for source in sources {
                    self.run_control(depth, &executable, &action, source);
                }
            }
            Some(Command::Simple(_)) => {
                for source in sources {
                    self.queue_next(QueueEntry {
                        depth,
                        action: EntryAction::Execute {
                            context: executable.clone(),
                            source,
                        },
                    });
                }
            }
            None => {}
        }
    }

    fn run_control(&mut self, depth: usize, executable: &CommandContext<S>, action: &ControlFn<S>, source: S) {
        if !self.try_charge() {
            self.reject_for_chain_length(std::slice::from_ref(&source), executable.input());
            return;
        }
        let context = executable.copy_for(source.clone());
        self.profiler.push(&format!("execute {}", context.input()));
        let outcome = {
            let mut control = ExecutionControl {
                context: self,
                depth: depth + 1,
            };
            catch_unwind(AssertUnwindSafe(|| action(&context, &mut control)))
        };
        self.profiler.pop();
        match outcome {
            Ok(Ok(value)) => source.callback().on_success(value),
            Ok(Err(err)) => {
                source.callback().on_failure();
                source.handle_error(&err);
            }
            Err(_) => {
                error!(input = context.input(), "composite command panicked");
                source.callback().on_failure();
                source.handle_error(&CommandError::failure(
                    "An unexpected error occurred trying to execute that command",
                ));
            }
        }
    }

    fn execute_command(&mut self, context: &CommandContext<S>, source: S) {
        if !self.try_charge() {
            self.reject_for_chain_length(std::slice::from_ref(&source), context.input());
            return;
        }
        self.profiler.push(&format!("execute {}", context.input()));
        match run_simple(context, &source) {
            Ok(value) => source.callback().on_success(value),
            Err(err) => {
                source.callback().on_failure();
                source.handle_error(&err);
            }
        }
        self.profiler.pop();
    }
}

/// Handle given to composite actions for queueing work on the active scheduler.
pub struct ExecutionControl<'a, S> {
    context: &'a mut ExecutionContext<S>,
    depth: usize,
}

impl<S: ExecutionSource> ExecutionControl<'_, S> {
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher<S>> {
        &self.context.dispatcher
    }

    /// Nesting level of work queued through this handle.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Parse `input` as `source` and queue it after the current action.
    pub fn perform_command(&mut self, input: &str, source: &S) -> bool {
        let dispatcher = Arc::clone(&self.context.dispatcher);
        let parse = dispatcher.parse(input, source.clone());
        match finish_parsing(&parse, input, source) {
            Some(chain) => self.queue_chain(input, chain, source),
            None => {
                source.callback().on_failure();
                false
            }
        }
    }

    pub fn queue_chain(&mut self, input: &str, chain: ContextChain<S>, source: &S) -> bool {
        if self.depth > self.context.limits.max_chain_length {
            self.context
                .reject_for_chain_length(std::slice::from_ref(source), input);
            return false;
        }
        self.context.queue_next(QueueEntry {
            depth: self.depth,
            action: EntryAction::Build {
                input: Arc::from(input),
                chain,
                source: source.clone(),
            },
        });
        true
    }
}

/// Validate a parse and flatten it into a chain, reporting failures to `source`.
pub fn finish_parsing<S: ExecutionSource>(
    parse: &ParseResults<S>,
    input: &str,
    source: &S,
) -> Option<ContextChain<S>> {
    let flattened = parse.validate().and_then(|()| {
        ContextChain::try_flatten(&parse.context.build(input)).ok_or_else(|| {
            CommandSyntaxError::with_context(SyntaxErrorKind::UnknownCommand, &parse.reader)
        })
    });
    match flattened {
        Ok(chain) => Some(chain),
        Err(err) => {
            report_syntax_error(source, &err);
            None
        }
    }
}

/// Send the error message, then the caret line pointing into the input.
pub fn report_syntax_error<S: ExecutionSource>(source: &S, err: &CommandSyntaxError) {
    source.send_failure(&err.raw_message());
    if let Some(context) = err.context() {
        source.send_failure(&context.to_string());
    }
}
