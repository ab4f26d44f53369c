//! Per-connection command state: the session's own suggestion tree and a
//! work queue drained on the session's turn.

use std::sync::Arc;

use mdcommand_dispatch::Suggestions;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::commands::{strip_slash, Commands, Dispatcher};
use crate::source::CommandSource;

/// Work posted to a session from other tasks.
pub enum SessionTask {
    /// Install a freshly projected suggestion tree.
    ApplySuggestionTree {
        /// Request number the tree was built for.
        generation: u64,
        /// Completion-only grammar for the session's source.
        tree: Arc<Dispatcher>,
    },
    /// Run a command line as the session's source.
    Perform(String),
}

/// Bounded pool for suggestion-tree projections.
///
/// Requests beyond the worker count are dropped rather than queued; the next
/// rebuild request for the session carries the newer state anyway.
#[derive(Clone)]
pub struct SuggestionPool {
    permits: Arc<Semaphore>,
    handle: Handle,
}

impl SuggestionPool {
    /// Pool with `workers` concurrent projections on `handle`'s blocking threads.
    pub fn new(workers: usize, handle: Handle) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            handle,
        }
    }

    /// Workers currently idle.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Project `commands` for `source` in the background and post the result
    /// to `tx`. Returns `false` when every worker is busy.
    pub fn request_rebuild(
        &self,
        commands: Arc<Commands>,
        source: CommandSource,
        generation: u64,
        tx: mpsc::UnboundedSender<SessionTask>,
    ) -> bool {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            debug!(
                source = source.text_name(),
                generation, "suggestion pool saturated; rebuild dropped"
            );
            return false;
        };
        self.handle.spawn_blocking(move || {
            let _permit = permit;
            let tree = Arc::new(commands.build_suggestion_tree(&source));
            // A closed queue means the session is gone.
            let _ = tx.send(SessionTask::ApplySuggestionTree { generation, tree });
        });
        true
    }
}

/// One connected principal.
pub struct Session {
    source: CommandSource,
    commands: Arc<Commands>,
    pool: SuggestionPool,
    tx: mpsc::UnboundedSender<SessionTask>,
    rx: mpsc::UnboundedReceiver<SessionTask>,
    tree: Option<Arc<Dispatcher>>,
    applied_generation: u64,
    requested_generation: u64,
}

impl Session {
    /// Session for `source`. No suggestion tree is applied until a rebuild lands.
    pub fn new(source: CommandSource, commands: Arc<Commands>, pool: SuggestionPool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            commands,
            pool,
            tx,
            rx,
            tree: None,
            applied_generation: 0,
            requested_generation: 0,
        }
    }

    pub fn source(&self) -> &CommandSource {
        &self.source
    }

    /// Replace the session's source, e.g. after a permission change.
    pub fn set_source(&mut self, source: CommandSource) {
        self.source = source;
    }

    /// Handle other tasks use to post work to this session.
    pub fn sender(&self) -> mpsc::UnboundedSender<SessionTask> {
        self.tx.clone()
    }

    /// Ask the pool to rebuild this session's suggestion tree.
    pub fn request_suggestion_rebuild(&mut self) -> bool {
        self.requested_generation += 1;
        self.pool.request_rebuild(
            Arc::clone(&self.commands),
            self.source.clone(),
            self.requested_generation,
            self.tx.clone(),
        )
    }

    /// Apply every task already queued. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.apply(task);
            applied += 1;
        }
        applied
    }

    /// Wait for the next task and apply it.
    pub async fn pump_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                self.apply(task);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, task: SessionTask) {
        match task {
            SessionTask::ApplySuggestionTree { generation, tree } => {
                debug!(
                    source = self.source.text_name(),
                    generation,
                    nodes = tree.len(),
                    "suggestion tree applied"
                );
                self.tree = Some(tree);
                self.applied_generation = generation;
            }
            SessionTask::Perform(line) => {
                self.commands.perform_command(&line, &self.source);
            }
        }
    }

    /// Generation of the tree currently applied; 0 before the first.
    pub fn applied_generation(&self) -> u64 {
        self.applied_generation
    }

    /// Completions for `partial` against the applied tree.
    pub fn suggest(&self, partial: &str) -> Suggestions {
        match &self.tree {
            Some(tree) => {
                let command = strip_slash(partial);
                let parse = tree.parse(command, self.source.clone());
                tree.get_completion_suggestions(&parse)
                    .shifted(partial.len() - command.len())
            }
            None => Suggestions::empty(),
        }
    }

    /// Run `input` now as this session's source.
    pub fn perform(&self, input: &str) -> bool {
        self.commands.perform_command(input, &self.source)
    }
}
