use crate::runtime::Executor;
use crate::task::{Id, Outcome, TaskError};

use std::fmt;
use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use tracing::trace;

pub(crate) type BoxBody<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'static>>;

/// Suspended execution state of a task.
///
/// A frame has exactly one owner at any instant: the `Task` that created it,
/// then whichever awaiter or driver consumed that task. Ownership moves as a
/// `Box<Frame<T>>`, it is never shared.
pub(crate) struct Frame<T> {
    pub(crate) id: Id,

    /// `None` once the body reached its terminal step.
    body: Option<BoxBody<T>>,

    capsule: Outcome<T>,

    /// Waker of whoever must be resumed when this frame makes progress.
    continuation: Option<Waker>,

    executor: Option<Arc<dyn Executor>>,
}

impl<T> Frame<T> {
    pub(crate) fn new(body: BoxBody<T>) -> Box<Self> {
        Box::new(Frame {
            id: Id::next(),
            body: Some(body),
            capsule: Outcome::Empty,
            continuation: None,
            executor: None,
        })
    }

    /// Binds `executor` to this frame. A frame can only be bound once.
    pub(crate) fn bind(&mut self, executor: Arc<dyn Executor>) {
        assert!(
            self.executor.is_none(),
            "task {} is already bound to an executor",
            self.id
        );
        self.executor = Some(executor);
    }

    pub(crate) fn executor(&self) -> Option<&Arc<dyn Executor>> {
        self.executor.as_ref()
    }

    pub(crate) fn set_continuation(&mut self, waker: &Waker) {
        if !self.continuation.as_ref().is_some_and(|c| c.will_wake(waker)) {
            self.continuation = Some(waker.clone());
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.body.is_none()
    }

    /// Polls the body once on the current thread.
    ///
    /// Returns `Ready` when the body reached its terminal step, in which case
    /// the capsule is populated with its value or failure. Panics raised by
    /// the body are caught here and stored as [`TaskError::Panicked`].
    pub(crate) fn resume(&mut self) -> Poll<()> {
        let Frame {
            id,
            body,
            capsule,
            continuation,
            ..
        } = self;

        let Some(waker) = continuation.as_ref() else {
            panic!("task {id} resumed without a continuation");
        };
        let Some(fut) = body.as_mut() else {
            panic!("task {id} resumed after completion");
        };

        let span = tracing::trace_span!("task", id = id.as_u64());
        let _enter = span.enter();
        trace!("resume");

        let mut cx = Context::from_waker(waker);
        let res = panic::catch_unwind(panic::AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));

        let output = match res {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(output)) => output,
            Err(payload) => Err(TaskError::panicked(*id, payload).into()),
        };

        // Drop the body before publishing the outcome so everything it
        // captured is released on the thread that finished it.
        *body = None;
        capsule.fill(output);
        trace!(failed = capsule.is_failure(), "terminal");

        Poll::Ready(())
    }

    pub(crate) fn take_outcome(&mut self) -> Outcome<T> {
        debug_assert!(self.is_complete(), "outcome taken from a running task");
        self.capsule.take()
    }
}

impl<T> fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("complete", &self.is_complete())
            .field("bound", &self.executor.is_some())
            .finish()
    }
}
