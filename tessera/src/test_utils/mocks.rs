use crate::runtime::{Executor, Work};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Wake, Waker};

/// Runs every pushed item immediately on the pushing thread.
#[derive(Debug, Default, Copy, Clone)]
pub(crate) struct InlineExecutor;

impl Executor for InlineExecutor {
    fn push(&self, work: Work) {
        work()
    }
}

/// Waker counting how many times it was woken.
#[derive(Debug, Clone)]
pub(crate) struct WakeCounter {
    inner: Arc<Counter>,
}

#[derive(Debug, Default)]
struct Counter {
    wakes: AtomicUsize,
}

impl Wake for Counter {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

impl WakeCounter {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Counter::default()),
        }
    }

    pub(crate) fn waker(&self) -> Waker {
        Waker::from(self.inner.clone())
    }

    pub(crate) fn wakes(&self) -> usize {
        self.inner.wakes.load(Ordering::SeqCst)
    }
}
