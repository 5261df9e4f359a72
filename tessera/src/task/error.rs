use crate::task::Id;
use std::any::Any;

/// Errors produced by the task machinery itself, as opposed to errors returned
/// by a task's body.
///
/// They travel inside an [`Outcome::Failure`] like any other failure, so
/// callers recover them with [`anyhow::Error::downcast_ref`].
///
/// [`Outcome::Failure`]: crate::Outcome::Failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task body panicked while it was being polled. The panic was caught
    /// at the frame boundary and turned into a failure.
    #[error("task {id} panicked: {message}")]
    Panicked { id: Id, message: String },

    /// The driver owning the task was destroyed before the task reached its
    /// terminal step, e.g. its resumption was still queued when the executor
    /// was stopped.
    #[error("task {id} was abandoned before completion")]
    Abandoned { id: Id },

    /// A value was extracted from an empty [`Outcome`](crate::Outcome), or a
    /// callback bridge was resumed before its result was set.
    #[error("no value present")]
    NoValue,

    /// A callback bridge's resume signal was dropped without being fired.
    #[error("resume signal dropped before it was fired")]
    ResumeDropped,
}

impl TaskError {
    pub(crate) fn panicked(id: Id, panic: Box<dyn Any + Send + 'static>) -> Self {
        let message = panic_payload_as_str(&panic)
            .unwrap_or("unknown panic payload")
            .to_string();

        TaskError::Panicked { id, message }
    }

    /// Returns true if the error is a caught panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }

    /// Returns true if the task was abandoned by its driver.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, TaskError::Abandoned { .. })
    }
}

pub(crate) fn panic_payload_as_str(payload: &Box<dyn Any + Send>) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<String>() {
        return Some(s);
    }

    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return Some(s);
    }

    None
}
