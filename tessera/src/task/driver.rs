use crate::task::frame::Frame;
use crate::task::{Detached, Id, Outcome, TaskError};
use crate::utils::ScopeGuard;

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Poll, Wake, Waker};
use tracing::{trace, warn};

/// Lifecycle of a driver. Exactly one thread may hold `RUNNING`.
const SCHEDULED: usize = 0;
const RUNNING: usize = 1;
const IDLE: usize = 2;
const NOTIFIED: usize = 3;
const COMPLETE: usize = 4;

pub(crate) type Completion<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// Detached computation driving a frame to its terminal step.
///
/// The driver is its own waker. Its first resumption goes through the frame's
/// executor if one is bound, every later resumption runs inline on the thread
/// that wakes it, which is whichever thread finished the operation the frame
/// was suspended on.
pub(crate) struct Driver<T> {
    id: Id,
    state: AtomicUsize,
    frame: Mutex<Option<Box<Frame<T>>>>,
    on_complete: Mutex<Option<Completion<T>>>,
}

impl<T: Send + 'static> Driver<T> {
    /// Takes ownership of `frame` and drives it. `on_complete` is called
    /// exactly once: with the terminal outcome, or with
    /// [`TaskError::Abandoned`] if the driver is destroyed first.
    pub(crate) fn launch(frame: Box<Frame<T>>, on_complete: Completion<T>) -> Detached {
        let id = frame.id;
        let detached = Detached::new(id);

        let latch = detached.latch();
        let on_complete: Completion<T> = Box::new(move |outcome| {
            let _release = ScopeGuard::new(|| latch.release());
            on_complete(outcome);
        });

        let executor = frame.executor().cloned();
        let driver = Arc::new(Driver {
            id,
            state: AtomicUsize::new(SCHEDULED),
            frame: Mutex::new(Some(frame)),
            on_complete: Mutex::new(Some(on_complete)),
        });

        match executor {
            Some(executor) => {
                trace!(task.id = id.as_u64(), "reschedule");
                executor.push(Box::new(move || driver.run()));
            }
            None => driver.run(),
        }

        detached
    }

    fn run(self: Arc<Self>) {
        if let Err(state) =
            self.state
                .compare_exchange(SCHEDULED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            panic!("task {} run from unexpected state {state}", self.id);
        }

        let waker = Waker::from(self.clone());

        loop {
            match self.poll_frame(&waker) {
                Poll::Ready(outcome) => {
                    self.state.store(COMPLETE, Ordering::Release);
                    self.complete(outcome);
                    return;
                }
                Poll::Pending => {
                    match self.state.compare_exchange(
                        RUNNING,
                        IDLE,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return,
                        Err(NOTIFIED) => {
                            // Woken while polling: poll again on this thread.
                            self.state.store(RUNNING, Ordering::Release);
                        }
                        Err(state) => panic!("task {} left running in state {state}", self.id),
                    }
                }
            }
        }
    }

    fn poll_frame(&self, waker: &Waker) -> Poll<Outcome<T>> {
        let Some(mut slot) = self.frame.try_lock() else {
            panic!("task {} resumed concurrently", self.id);
        };
        let Some(frame) = slot.as_mut() else {
            panic!("task {} resumed after completion", self.id);
        };

        frame.set_continuation(waker);
        match frame.resume() {
            Poll::Pending => Poll::Pending,
            Poll::Ready(()) => {
                let outcome = frame.take_outcome();
                // Destroy the finished frame.
                *slot = None;
                Poll::Ready(outcome)
            }
        }
    }

    fn complete(&self, outcome: Outcome<T>) {
        let on_complete = self.on_complete.lock().take();
        trace!(task.id = self.id.as_u64(), "complete");

        if let Some(on_complete) = on_complete {
            on_complete(outcome);
        }
    }
}

impl<T: Send + 'static> Wake for Driver<T> {
    fn wake(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        trace!(task.id = self.id.as_u64(), "resume inline");
                        self.run();
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                // Already going to be polled, or nothing left to poll.
                _ => return,
            }
        }
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().wake()
    }
}

impl<T> Drop for Driver<T> {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.get_mut().take() {
            warn!(task.id = self.id.as_u64(), "task abandoned before completion");

            drop(self.frame.get_mut().take());
            on_complete(Outcome::Failure(TaskError::Abandoned { id: self.id }.into()));
        }
    }
}
