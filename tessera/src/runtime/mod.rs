//! Executors: where a bound task's first resumption runs.
//!
//! Two executors ship with the crate:
//!
//! - [`ThreadPool`], a fixed set of worker threads sharing one FIFO queue,
//!   configured through [`Builder`].
//! - [`EventLoopExecutor`], which forwards work into an externally driven
//!   [`Reactor`] such as the bundled [`EventLoop`].
//!
//! Any other scheduling policy plugs in by implementing [`Executor`].

// Public API
mod builder;
pub use builder::Builder;

mod event_loop;
pub use event_loop::{EventLoop, EventLoopExecutor, Reactor, WorkGuard};

mod pool;
pub use pool::ThreadPool;

mod registry;
pub use registry::TaskRegistry;

#[cfg(test)]
mod tests;

/// A unit of work accepted by an [`Executor`].
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Accepts units of work and guarantees each eventually runs on some thread,
/// unless the executor is stopped first, in which case the work is dropped
/// without running.
///
/// `push` must be callable from any thread, including from work the executor
/// is currently running.
pub trait Executor: Send + Sync + 'static {
    fn push(&self, work: Work);
}

