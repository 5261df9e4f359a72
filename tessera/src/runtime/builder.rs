use crate::runtime::ThreadPool;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of worker threads.
const WORKER_THREADS: usize = 4;

#[derive(Clone)]
pub(crate) struct ThreadNameFn(pub(crate) Arc<dyn Fn() -> String + Send + Sync + 'static>);

fn default_thread_name_fn() -> ThreadNameFn {
    let worker_count = Arc::new(AtomicUsize::new(0));

    ThreadNameFn(Arc::new(move || {
        let id = worker_count.fetch_add(1, Ordering::Relaxed);
        format!("tessera-worker-{id}")
    }))
}

impl fmt::Debug for ThreadNameFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadNameFn").field(&"<function>").finish()
    }
}

/// Configures and builds a [`ThreadPool`].
///
/// ```
/// use tessera::runtime::Builder;
///
/// let pool = Builder::new()
///     .worker_threads(2)
///     .thread_name("io")
///     .try_build()
///     .unwrap();
///
/// assert_eq!(pool.num_workers(), 2);
/// ```
#[derive(Debug)]
pub struct Builder {
    /// Defaults to 4.
    worker_threads: usize,

    /// Name fn used for threads spawned by the pool.
    thread_name: ThreadNameFn,

    /// Stack size used for threads spawned by the pool.
    thread_stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            worker_threads: WORKER_THREADS,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
        }
    }

    /// The number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `val` is 0.
    #[track_caller]
    pub fn worker_threads(mut self, val: usize) -> Self {
        assert!(val > 0, "worker_threads must be greater than 0");
        self.worker_threads = val;
        self
    }

    /// Sets the name of every thread spawned by the pool.
    ///
    /// The default name is "tessera-worker-{N}", where N is monotonically
    /// increasing.
    pub fn thread_name(mut self, val: impl Into<String>) -> Self {
        let val = val.into();
        self.thread_name = ThreadNameFn(Arc::new(move || val.clone()));
        self
    }

    /// Sets a function used to generate the name of threads spawned by the
    /// pool.
    pub fn thread_name_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = ThreadNameFn(Arc::new(f));
        self
    }

    /// Sets the stack size (in bytes) for worker threads.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// specifies a minimal stack size.
    pub fn thread_stack_size(mut self, val: usize) -> Self {
        self.thread_stack_size = Some(val);
        self
    }

    /// Spawns the worker threads. Returns once every worker is running.
    pub fn try_build(self) -> Result<Arc<ThreadPool>> {
        ThreadPool::start(self.into())
    }
}

// Export builder as a PoolConfig object consumed by the pool.
#[derive(Debug, Clone)]
pub(crate) struct PoolConfig {
    pub(crate) worker_threads: usize,
    pub(crate) thread_name: ThreadNameFn,
    pub(crate) thread_stack_size: Option<usize>,
}

impl From<Builder> for PoolConfig {
    fn from(builder: Builder) -> Self {
        PoolConfig {
            worker_threads: builder.worker_threads,
            thread_name: builder.thread_name,
            thread_stack_size: builder.thread_stack_size,
        }
    }
}
