//! Signed-argument context and ordering of dependent side effects.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// A verified payload bound to one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArgument {
    /// Principal that signed the payload.
    pub signer: String,
    /// The signed text.
    pub content: String,
    /// Detached signature bytes as received.
    pub signature: Vec<u8>,
}

/// Map from argument name to its verified payload. Compared by identity.
#[derive(Clone, Default)]
pub struct SigningContext(Option<Arc<IndexMap<String, SignedArgument>>>);

impl SigningContext {
    /// No signed arguments.
    pub const ANONYMOUS: Self = Self(None);

    /// Context carrying `arguments`.
    pub fn signed(arguments: IndexMap<String, SignedArgument>) -> Self {
        Self(Some(Arc::new(arguments)))
    }

    /// Payload bound to `name`.
    pub fn argument(&self, name: &str) -> Option<&SignedArgument> {
        self.0.as_ref()?.get(name)
    }

    /// Whether nothing is signed.
    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

impl PartialEq for SigningContext {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("SigningContext::ANONYMOUS"),
            Some(arguments) => f
                .debug_tuple("SigningContext")
                .field(&arguments.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// Serialises side effects issued by one source.
///
/// `Immediate` runs each task inline. `Sequential` hands tasks to a tokio task
/// that runs them one at a time in append order.
#[derive(Clone)]
pub enum TaskChainer {
    /// Run appended tasks on the caller's thread.
    Immediate,
    /// Run appended tasks in order on a background task.
    Sequential(Arc<mpsc::UnboundedSender<Task>>),
}

impl TaskChainer {
    /// Chainer that runs tasks inline.
    pub fn immediate() -> Self {
        Self::Immediate
    }

    /// Chainer backed by a task spawned on `handle`.
    pub fn sequential(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!("chained task panicked");
                }
            }
        });
        Self::Sequential(Arc::new(tx))
    }

    /// Run `task` after every previously appended task.
    pub fn append(&self, task: impl FnOnce() + Send + 'static) {
        match self {
            Self::Immediate => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!("chained task panicked");
                }
            }
            Self::Sequential(tx) => {
                if tx.send(Box::new(task)).is_err() {
                    warn!("task chainer stopped; dropping task");
                }
            }
        }
    }
}

impl Default for TaskChainer {
    fn default() -> Self {
        Self::Immediate
    }
}

impl PartialEq for TaskChainer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Immediate, Self::Immediate) => true,
            (Self::Sequential(a), Self::Sequential(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for TaskChainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("TaskChainer::Immediate"),
            Self::Sequential(_) => f.write_str("TaskChainer::Sequential"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn signing_contexts_compare_by_identity() {
        let mut arguments = IndexMap::new();
        arguments.insert(
            "message".to_string(),
            SignedArgument {
                signer: "Alex".into(),
                content: "hi".into(),
                signature: vec![1, 2, 3],
            },
        );
        let signed = SigningContext::signed(arguments.clone());
        assert_eq!(signed, signed.clone());
        assert_ne!(signed, SigningContext::signed(arguments));
        assert_eq!(SigningContext::ANONYMOUS, SigningContext::default());
        assert_eq!(signed.argument("message").map(|a| a.content.as_str()), Some("hi"));
    }

    #[test]
    fn immediate_chainer_runs_inline() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chainer = TaskChainer::immediate();
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            chainer.append(move || seen.lock().unwrap().push(i));
        }
        chainer.append(|| panic!("swallowed"));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn sequential_chainer_preserves_append_order() {
        let chainer = TaskChainer::sequential(&Handle::current());
        assert_eq!(chainer, chainer.clone());
        assert_ne!(chainer, TaskChainer::immediate());

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        for i in 0..5 {
            let done_tx = done_tx.clone();
            chainer.append(move || {
                let _ = done_tx.send(i);
            });
        }
        let mut order = Vec::new();
        for _ in 0..5 {
            order.push(done_rx.recv().await.unwrap());
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }
}
