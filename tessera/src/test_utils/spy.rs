use crate::runtime::{Executor, Work};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Executor recording pushed work without running it. Tests decide when the
/// work runs (`run_all`) or is lost (`drop_all`).
#[derive(Default)]
pub(crate) struct SpyExecutor {
    queue: Mutex<VecDeque<Work>>,
    pushed: AtomicUsize,
}

impl SpyExecutor {
    /// Total number of pushes, including items already run or dropped.
    pub(crate) fn num_pushed(&self) -> usize {
        self.pushed.load(Ordering::SeqCst)
    }

    /// Runs queued work, including work pushed while running, until the queue
    /// is empty. Returns how many items ran.
    pub(crate) fn run_all(&self) -> usize {
        let mut count = 0;

        // Never hold the lock while running: work may push again.
        loop {
            let Some(work) = self.queue.lock().pop_front() else {
                break;
            };
            work();
            count += 1;
        }
        count
    }

    /// Drops queued work without running it.
    pub(crate) fn drop_all(&self) {
        let dropped = std::mem::take(&mut *self.queue.lock());
        drop(dropped);
    }
}

impl Executor for SpyExecutor {
    fn push(&self, work: Work) {
        self.pushed.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().push_back(work);
    }
}
