//! Lazy, single-consumer tasks.
//!
//! A [`Task`] is what an async function returns when annotated with
//! [`#[tessera::task]`](macro@crate::task) (or built with [`Task::new`]). Nothing
//! runs until the task is *consumed*, which happens exactly once, in one of
//! these ways:
//!
//! - `.await` / [`Task::co_await_try`] from inside another task: the body runs
//!   inline on whatever thread is polling the caller.
//! - [`Task::set_executor`] then [`ReschedulingTask::start`],
//!   [`sync_await`](crate::sync_await) or `.await`: the first resumption is
//!   handed to the executor.
//! - [`Task::start`] / `sync_await` on the unbound task: the body runs on the
//!   calling thread until it first suspends.
//!
//! Every consuming operation takes the task by value, so consuming it twice
//! does not compile:
//!
//! ```compile_fail
//! # use tessera::Task;
//! # async fn caller() -> anyhow::Result<()> {
//! let task = Task::new(async { Ok(1) });
//! let a = task.await?;
//! let b = task.await?; // error[E0382]: use of moved value: `task`
//! # Ok(())
//! # }
//! ```
use crate::runtime::Executor;

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

pub mod awaiter;
pub use self::awaiter::{RescheduleAwaiter, TryAwaiter, ValueAwaiter};

mod detached;
pub use self::detached::Detached;

mod driver;
use self::driver::Driver;

mod error;
pub use self::error::TaskError;
pub(crate) use self::error::panic_payload_as_str;

pub(crate) mod frame;
use self::frame::Frame;

pub mod id;
pub use self::id::Id;

mod join;
pub use self::join::sync_await;

mod outcome;
pub use self::outcome::Outcome;


/// A lazily started computation producing a `T` or failing.
///
/// See the [module documentation](self) for how a task is consumed.
///
/// Dropping a task that was never consumed drops its body, and everything the
/// body captured, right away.
#[must_use = "tasks do nothing unless awaited, started or joined"]
pub struct Task<T> {
    frame: Box<Frame<T>>,
}

impl<T: Send + 'static> Task<T> {
    /// Wraps `future` into a task without polling it.
    ///
    /// ```
    /// use tessera::{Task, sync_await};
    ///
    /// let task = Task::new(async { Ok(2 + 3) });
    /// assert_eq!(sync_await(task).unwrap(), 5);
    /// ```
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            frame: Frame::new(Box::pin(future)),
        }
    }

    /// Binds `executor` to this task. The returned task's first resumption
    /// runs on the executor instead of inline.
    pub fn set_executor(mut self, executor: Arc<dyn Executor>) -> ReschedulingTask<T> {
        self.frame.bind(executor);
        ReschedulingTask { frame: self.frame }
    }

    /// Drives the task inline and resolves to its [`Outcome`] instead of
    /// returning failures as `Err`.
    pub fn co_await_try(self) -> TryAwaiter<T> {
        TryAwaiter::new(self.frame)
    }

    /// Runs the task on the calling thread until it first suspends, then
    /// returns. `on_complete` receives the outcome on whichever thread
    /// finishes the task.
    pub fn start<F>(self, on_complete: F) -> Detached
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        Driver::launch(self.frame, Box::new(on_complete))
    }
}

impl<T> Task<T> {
    /// Returns the [`Id`] of this task.
    pub fn id(&self) -> Id {
        self.frame.id
    }

    #[cfg(test)]
    pub(crate) fn into_frame(self) -> Box<Frame<T>> {
        self.frame
    }
}

impl<T> IntoFuture for Task<T> {
    type Output = anyhow::Result<T>;
    type IntoFuture = ValueAwaiter<TryAwaiter<T>>;

    fn into_future(self) -> Self::IntoFuture {
        ValueAwaiter::new(TryAwaiter::new(self.frame))
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Task").field("id", &self.id()).finish()
    }
}

/// A [`Task`] bound to an [`Executor`].
///
/// Its first resumption is pushed onto the executor; afterwards the chain
/// resumes inline on whichever thread wakes it. Created by
/// [`Task::set_executor`].
#[must_use = "tasks do nothing unless awaited, started or joined"]
pub struct ReschedulingTask<T> {
    frame: Box<Frame<T>>,
}

impl<T: Send + 'static> ReschedulingTask<T> {
    /// Fire-and-forget: submits the chain to its executor and returns
    /// immediately. `on_complete` receives the final outcome on whichever
    /// thread runs the terminal step.
    ///
    /// If the executor drops the submission (e.g. it is stopped before the
    /// resumption is dequeued), `on_complete` receives
    /// [`TaskError::Abandoned`].
    pub fn start<F>(self, on_complete: F) -> Detached
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        Driver::launch(self.frame, Box::new(on_complete))
    }

    /// Suspends the calling task until this one, running on its executor,
    /// terminates. Resolves to the [`Outcome`].
    pub fn co_await_try(self) -> RescheduleAwaiter<T> {
        RescheduleAwaiter::new(self)
    }
}

impl<T> ReschedulingTask<T> {
    /// Returns the [`Id`] of this task.
    pub fn id(&self) -> Id {
        self.frame.id
    }

    pub(crate) fn into_frame(self) -> Box<Frame<T>> {
        self.frame
    }
}

impl<T: Send + 'static> IntoFuture for ReschedulingTask<T> {
    type Output = anyhow::Result<T>;
    type IntoFuture = ValueAwaiter<RescheduleAwaiter<T>>;

    fn into_future(self) -> Self::IntoFuture {
        ValueAwaiter::new(RescheduleAwaiter::new(self))
    }
}

impl<T> fmt::Debug for ReschedulingTask<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("ReschedulingTask")
            .field("id", &self.id())
            .finish()
    }
}

/// Anything that can be started with a completion callback: the entry point
/// used by [`sync_await`](crate::sync_await) and
/// [`TaskRegistry`](crate::runtime::TaskRegistry).
pub trait Start {
    type Output: Send + 'static;

    fn id(&self) -> Id;

    fn start<F>(self, on_complete: F) -> Detached
    where
        F: FnOnce(Outcome<Self::Output>) + Send + 'static;
}

impl<T: Send + 'static> Start for Task<T> {
    type Output = T;

    fn id(&self) -> Id {
        Task::id(self)
    }

    fn start<F>(self, on_complete: F) -> Detached
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        Task::start(self, on_complete)
    }
}

impl<T: Send + 'static> Start for ReschedulingTask<T> {
    type Output = T;

    fn id(&self) -> Id {
        ReschedulingTask::id(self)
    }

    fn start<F>(self, on_complete: F) -> Detached
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        ReschedulingTask::start(self, on_complete)
    }
}
