//! Error types shared by the scheduler and the renderer.

use thiserror::Error;

use crate::scheduler::JobId;

/// Convenience alias used across the crate.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// A backend primitive refused an operation.
///
/// Backends build this themselves; the runtime never retries the failed
/// structural mutation and hands the error back to whoever called `render`
/// or flushed the queue.
#[derive(Debug, Error)]
#[error("backend operation `{operation}` failed: {message}")]
pub struct BackendError {
    operation: &'static str,
    message: String,
}

impl BackendError {
    /// Create a new backend error for the named primitive.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// Name of the primitive that failed (`insert`, `remove`, ...).
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Backend-provided description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by rendering and by flushing the scheduler.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A backend primitive failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A mounted node was expected to carry a backend handle (or a component
    /// instance) but did not.
    #[error("mounted {node} node has no {what}")]
    MissingHandle {
        node: &'static str,
        what: &'static str,
    },

    /// A node that is already live somewhere else was handed to `patch`.
    /// Build a fresh node instead of moving a mounted one.
    #[error("{node} node is already mounted elsewhere")]
    NodeReused { node: &'static str },

    /// A job kept re-queueing itself within a single flush.
    #[error("job {job:?} exceeded the recursion limit of {limit} runs in one flush")]
    RecursionLimit { job: JobId, limit: usize },

    /// `flush_all` ran out of cycles before the queues went quiet.
    #[error("scheduler did not settle after {cycles} flush cycles")]
    FlushLimit { cycles: usize },

    /// Configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl RuntimeError {
    pub(crate) fn missing_handle(node: &'static str) -> Self {
        Self::MissingHandle {
            node,
            what: "backend handle",
        }
    }
}
