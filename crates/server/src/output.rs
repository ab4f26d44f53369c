//! Where user-visible command feedback goes.

use std::sync::Mutex;

use tracing::info;

/// Receiver of plain-text feedback for one command source.
pub trait CommandOutput: Send + Sync {
    /// Deliver one line.
    fn send_system_message(&self, message: &str);

    /// Whether success feedback should be delivered.
    fn accepts_success(&self) -> bool {
        true
    }

    /// Whether failure feedback should be delivered.
    fn accepts_failure(&self) -> bool {
        true
    }

    /// Whether successes should also be relayed to operators.
    fn should_inform_admins(&self) -> bool {
        false
    }

    /// Output that cannot be silenced; suppressing it is a no-op.
    fn always_accepts(&self) -> bool {
        false
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl CommandOutput for NullOutput {
    fn send_system_message(&self, _message: &str) {}

    fn accepts_success(&self) -> bool {
        false
    }

    fn accepts_failure(&self) -> bool {
        false
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    lines: Mutex<Vec<String>>,
}

impl BufferedOutput {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Remove and return every line received so far.
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl CommandOutput for BufferedOutput {
    fn send_system_message(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

/// Console output: every line becomes an `info!` event and informs operators.
#[derive(Debug, Clone)]
pub struct TracingOutput {
    name: String,
}

impl TracingOutput {
    /// Output labelled with `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CommandOutput for TracingOutput {
    fn send_system_message(&self, message: &str) {
        info!(source = %self.name, "{}", message);
    }

    fn should_inform_admins(&self) -> bool {
        true
    }

    fn always_accepts(&self) -> bool {
        true
    }
}
