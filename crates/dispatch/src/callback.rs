//! Success/failure sinks that let an outer invocation observe an inner one.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

type ResultFn = dyn Fn(bool, i32) + Send + Sync;

/// A `(success, value)` sink. [`ResultCallback::EMPTY`] composes as a no-op.
#[derive(Clone, Default)]
pub struct ResultCallback(Option<Arc<ResultFn>>);

impl ResultCallback {
    pub const EMPTY: Self = Self(None);

    pub fn new(f: impl Fn(bool, i32) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(f)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Report an outcome. A panicking sink is logged and swallowed.
    pub fn on_result(&self, success: bool, value: i32) {
        let Some(f) = &self.0 else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| f(success, value))).is_err() {
            error!(success, value, "result callback panicked");
        }
    }

    pub fn on_success(&self, value: i32) {
        self.on_result(true, value);
    }

    pub fn on_failure(&self) {
        self.on_result(false, 0);
    }

    /// `b` if `a` is empty, `a` if `b` is empty, otherwise both in order.
    pub fn chain(a: &Self, b: &Self) -> Self {
        match (&a.0, &b.0) {
            (None, _) => b.clone(),
            (_, None) => a.clone(),
            (Some(first), Some(second)) => {
                let first = Arc::clone(first);
                let second = Arc::clone(second);
                Self(Some(Arc::new(move |success, value| {
                    Self(Some(Arc::clone(&first))).on_result(success, value);
                    Self(Some(Arc::clone(&second))).on_result(success, value);
                })))
            }
        }
    }
}

impl PartialEq for ResultCallback {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ResultCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ResultCallback::EMPTY")
        } else {
            f.write_str("ResultCallback(..)")
        }
    }
}
