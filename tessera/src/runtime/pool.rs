use crate::runtime::builder::PoolConfig;
use crate::runtime::{Builder, Executor, Work};
use crate::task::{Task, TaskError, panic_payload_as_str};
use anyhow::{Context, Result, anyhow, ensure};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error, trace, warn};

/// Fixed-size pool of worker threads sharing one unbounded FIFO queue.
///
/// Built with [`Builder`] or [`ThreadPool::new`]. Work pushed from any thread,
/// including a worker, is appended to the queue and picked up by the first
/// idle worker.
///
/// Dropping the last handle stops the pool and joins every worker thread.
pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Mutex<HashMap<ThreadId, thread::JoinHandle<()>>>,
    cfg: PoolConfig,
}

/// State shared with the worker threads. Workers never hold the pool itself,
/// so that dropping the last user handle is what shuts it down.
struct Shared {
    state: Mutex<State>,
    cv: Condvar,
}

struct State {
    queue: VecDeque<Work>,
    stopped: bool,
    running: usize,
}

impl ThreadPool {
    /// Pool with `worker_threads` workers and default settings otherwise.
    pub fn new(worker_threads: usize) -> Result<Arc<ThreadPool>> {
        ensure!(worker_threads > 0, "worker_threads must be greater than 0");
        Builder::new().worker_threads(worker_threads).try_build()
    }

    pub(super) fn start(cfg: PoolConfig) -> Result<Arc<ThreadPool>> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                stopped: false,
                running: 0,
            }),
            cv: Condvar::new(),
        });

        let pool = Arc::new(ThreadPool {
            shared,
            handles: Mutex::new(HashMap::with_capacity(cfg.worker_threads)),
            cfg,
        });

        for _ in 0..pool.cfg.worker_threads {
            let (id, handle) = match spawn_worker_thread(&pool.cfg, pool.shared.clone()) {
                Ok(spawned) => spawned,
                Err(e) => {
                    pool.stop();
                    return Err(e);
                }
            };
            pool.handles.lock().insert(id, handle);
        }

        // Spawning threads is async, wait for all threads to be started...
        {
            let mut state = pool.shared.state.lock();
            pool.shared
                .cv
                .wait_while(&mut state, |state| state.running < pool.cfg.worker_threads);
        }

        debug!(workers = pool.cfg.worker_threads, "thread pool started");
        Ok(pool)
    }

    /// Number of worker threads the pool was started with.
    pub fn num_workers(&self) -> usize {
        self.cfg.worker_threads
    }

    /// Number of items queued but not yet picked up by a worker.
    pub fn num_queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Stops the pool: no queued item starts after this returns. Items already
    /// running finish normally; queued items are dropped without running, and
    /// so is anything pushed later.
    ///
    /// Dropping a queued resumption abandons the task it belonged to, whose
    /// consumer then observes [`TaskError::Abandoned`].
    pub fn stop(&self) {
        let dropped = {
            let mut state = self.shared.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            self.shared.cv.notify_all();
            std::mem::take(&mut state.queue)
        };

        debug!("thread pool stopped");
        if !dropped.is_empty() {
            warn!(count = dropped.len(), "dropping queued work at shutdown");
        }

        // Outside the lock: dropping work may run completion callbacks that
        // push onto this very pool.
        drop(dropped);
    }

    /// Returns true once [`stop`](Self::stop) was called, directly or on drop.
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    /// Runs `future` to completion as a task bound to this pool and blocks the
    /// calling thread until it is done.
    ///
    /// Must not be called from one of this pool's workers when the pool has a
    /// single worker: the future could never be scheduled.
    ///
    /// # Panics
    ///
    /// Panics if the future panics or the pool is stopped before the future
    /// completes.
    ///
    /// ```
    /// use tessera::runtime::ThreadPool;
    ///
    /// let pool = ThreadPool::new(2).unwrap();
    /// assert_eq!(pool.block_on(async { 40 + 2 }), 42);
    /// ```
    pub fn block_on<F>(self: &Arc<Self>, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let task = Task::new(async move { Ok(future.await) }).set_executor(self.clone());

        match crate::sync_await(task) {
            Ok(output) => output,
            Err(e) => match e.downcast_ref::<TaskError>() {
                Some(TaskError::Panicked { message, .. }) => panic!("{message}"),
                _ => panic!("block_on failed: {e:#}"),
            },
        }
    }

    fn join_all(&self) -> Result<()> {
        let current = thread::current().id();
        let handles = self.handles.lock().drain().collect::<Vec<_>>();

        let errors = handles
            .into_iter()
            // A worker dropping the last handle cannot join itself.
            .filter(|(thread_id, _)| *thread_id != current)
            .filter_map(|(thread_id, handle)| handle.join().err().map(|_| thread_id))
            .collect::<Vec<_>>();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("{} worker thread(s) panicked", errors.len()))
        }
    }
}

impl Executor for ThreadPool {
    fn push(&self, work: Work) {
        let mut state = self.shared.state.lock();

        if state.stopped {
            drop(state);
            debug!("work pushed to a stopped thread pool, dropping it");
            drop(work);
            return;
        }

        state.queue.push_back(work);
        self.shared.cv.notify_one();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();

        if let Err(e) = self.join_all() {
            error!("error during thread pool shutdown: {e:?}");
        }
        debug!("thread pool joined");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.cfg.worker_threads)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn spawn_worker_thread(
    cfg: &PoolConfig,
    shared: Arc<Shared>,
) -> Result<(ThreadId, thread::JoinHandle<()>)> {
    let mut builder = thread::Builder::new();

    if let Some(stack_size) = cfg.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    let name = cfg.thread_name.0();
    let handle = builder
        .name(name.clone())
        .spawn(move || worker_loop(&shared))
        .with_context(|| format!("failed to spawn worker thread {name}"))?;

    Ok((handle.thread().id(), handle))
}

fn worker_loop(shared: &Shared) {
    {
        let mut state = shared.state.lock();
        state.running += 1;
        shared.cv.notify_all();
    }
    trace!("worker started");

    loop {
        let work = {
            let mut state = shared.state.lock();
            loop {
                if state.stopped {
                    trace!("worker exiting");
                    return;
                }
                if let Some(work) = state.queue.pop_front() {
                    break work;
                }
                shared.cv.wait(&mut state);
            }
        };

        // One bad item must not take the worker down with it.
        if let Err(payload) = panic::catch_unwind(panic::AssertUnwindSafe(work)) {
            error!(
                panic = panic_payload_as_str(&payload).unwrap_or("unknown panic payload"),
                "work item panicked on worker thread"
            );
        }
    }
}
