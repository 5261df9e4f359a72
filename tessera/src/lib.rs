//! Lazy, single-consumer tasks with pluggable executors.
//!
//! Write sequential-looking async code with [`#[tessera::task]`](macro@task),
//! chain tasks by awaiting them, bind a chain to an [`Executor`] to choose
//! where it starts, and collect its value, or failure, from async code with
//! `.await` or from a plain thread with [`sync_await`].
//!
//! ```
//! use tessera::runtime::ThreadPool;
//! use tessera::sync_await;
//!
//! #[tessera::task]
//! async fn inner() -> u32 {
//!     41
//! }
//!
//! #[tessera::task]
//! async fn outer() -> anyhow::Result<u32> {
//!     Ok(inner().await? + 1)
//! }
//!
//! let pool = ThreadPool::new(4).unwrap();
//! assert_eq!(sync_await(outer().set_executor(pool)).unwrap(), 42);
//! ```
//!
//! A failure raised anywhere in a chain, as an `Err` or a panic, travels up
//! unchanged and surfaces at the first point where a value is extracted.
//!
//! [`Executor`]: runtime::Executor

#[doc(inline)]
pub use tessera_macros::main;

#[doc(inline)]
pub use tessera_macros::task;

#[doc(inline)]
pub use tessera_macros::test;

pub mod future;

pub mod runtime;

pub mod task;
pub use task::{Detached, Outcome, ReschedulingTask, Start, Task, TaskError, sync_await};

mod utils;

#[cfg(test)]
mod test_utils;
