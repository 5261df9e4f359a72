use crate::task::{Detached, Id, Outcome, Start, TaskError};
use crate::utils::ScopeGuard;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Tracks fire-and-forget chains so that shutdown code can wait for them
/// instead of losing them.
///
/// Chains started through [`TaskRegistry::start`] are recorded until their
/// completion callback has returned. Once the registry is
/// [closed](Self::close), new submissions are refused and reported to their
/// callback as [`TaskError::Abandoned`] without running.
///
/// ```
/// use tessera::Task;
/// use tessera::runtime::{TaskRegistry, ThreadPool};
///
/// let pool = ThreadPool::new(2).unwrap();
/// let registry = TaskRegistry::new();
///
/// for i in 0..8 {
///     let task = Task::new(async move { Ok(i) }).set_executor(pool.clone());
///     registry.start(task, |_| {});
/// }
///
/// registry.wait_idle();
/// assert!(registry.is_empty());
/// ```
pub struct TaskRegistry {
    // Start time of every outstanding chain.
    tasks: DashMap<Id, Instant>,

    // Keep track of size separately because DashMap impl for len iterates over
    // all shards.
    size: AtomicUsize,

    closed: AtomicBool,

    idle: Mutex<()>,
    idle_cv: Condvar,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: DashMap::new(),
            size: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            idle: Mutex::new(()),
            idle_cv: Condvar::new(),
        })
    }

    /// Starts `task` and tracks it until `on_complete` has returned.
    pub fn start<S, F>(self: &Arc<Self>, task: S, on_complete: F) -> Detached
    where
        S: Start,
        F: FnOnce(Outcome<S::Output>) + Send + 'static,
    {
        let id = task.id();

        if self.is_closed() {
            warn!(task.id = id.as_u64(), "registry closed, abandoning task");
            drop(task);
            on_complete(Outcome::Failure(TaskError::Abandoned { id }.into()));
            return Detached::finished(id);
        }

        self.insert(id);

        let registry = self.clone();
        task.start(move |outcome| {
            let _untrack = ScopeGuard::new(|| registry.remove(&id));
            on_complete(outcome);
        })
    }

    fn insert(&self, id: Id) {
        self.size.fetch_add(1, Ordering::AcqRel);
        self.tasks.insert(id, Instant::now());
    }

    fn remove(&self, id: &Id) {
        if self.tasks.remove(id).is_some() && self.size.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Taking the lock orders this notification after a waiter's check.
            let _idle = self.idle.lock();
            self.idle_cv.notify_all();
        }
    }

    /// Number of chains currently tracked.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outstanding chains with how long they have been running, oldest first.
    pub fn outstanding(&self) -> Vec<(Id, Duration)> {
        let mut tasks = self
            .tasks
            .iter()
            .map(|entry| (*entry.key(), entry.value().elapsed()))
            .collect::<Vec<_>>();

        tasks.sort_by(|a, b| b.1.cmp(&a.1));
        tasks
    }

    /// Blocks until every tracked chain has completed.
    pub fn wait_idle(&self) {
        let mut idle = self.idle.lock();
        self.idle_cv.wait_while(&mut idle, |_| !self.is_empty());
    }

    /// Returns true if the registry became idle before `timeout` elapsed.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let mut idle = self.idle.lock();
        self.idle_cv
            .wait_while_for(&mut idle, |_| !self.is_empty(), timeout);
        self.is_empty()
    }

    /// Refuses every later submission. Chains already running are unaffected
    /// and keep being tracked. Returns the chains outstanding at this point.
    pub fn close(&self) -> Vec<Id> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }

        let outstanding = self
            .outstanding()
            .into_iter()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        debug!(outstanding = outstanding.len(), "task registry closed");
        outstanding
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
