//! Suspension strategies used when one task awaits another.
//!
//! | Awaiter                | Resumes the caller                          | Output          |
//! |------------------------|---------------------------------------------|-----------------|
//! | [`TryAwaiter`]         | inline, on the thread that polls the callee | `Outcome<T>`    |
//! | [`ValueAwaiter`]       | like the awaiter it wraps                   | `Result<T>`     |
//! | [`RescheduleAwaiter`]  | from the thread that finishes the callee    | `Outcome<T>`    |
//!
//! Every awaiter owns the callee's frame (or the driver holding it) while the
//! caller is suspended, and destroys it once the outcome is extracted. Polling
//! an awaiter again after it returned `Ready` is a contract violation and
//! panics.
use crate::task::ReschedulingTask;
use crate::task::driver::Driver;
use crate::task::frame::Frame;
use crate::task::Outcome;

use parking_lot::Mutex;
use pin_project::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker, ready};
use tracing::trace;

/// Drives a task inline and resolves to its [`Outcome`].
///
/// Created by [`Task::co_await_try`](crate::Task::co_await_try).
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct TryAwaiter<T> {
    frame: Option<Box<Frame<T>>>,
}

impl<T> TryAwaiter<T> {
    pub(crate) fn new(frame: Box<Frame<T>>) -> Self {
        Self { frame: Some(frame) }
    }
}

impl<T> Future for TryAwaiter<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(frame) = self.frame.as_mut() else {
            panic!("`TryAwaiter` polled after completion");
        };

        trace!(task.id = frame.id.as_u64(), "await inline");

        // The caller's waker is the continuation: when the callee suspends on
        // something else, that something wakes the caller directly.
        frame.set_continuation(cx.waker());
        ready!(frame.resume());

        let outcome = frame.take_outcome();
        self.frame = None;
        Poll::Ready(outcome)
    }
}

impl<T> fmt::Debug for TryAwaiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryAwaiter")
            .field("frame", &self.frame)
            .finish()
    }
}

/// Wraps an awaiter resolving to an [`Outcome`] and extracts it: the value
/// comes back as `Ok`, a captured failure as `Err`.
///
/// This is what `.await` on a [`Task`](crate::Task) or a
/// [`ReschedulingTask`] produces.
#[pin_project]
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ValueAwaiter<A> {
    #[pin]
    inner: A,
}

impl<A> ValueAwaiter<A> {
    pub(crate) fn new(inner: A) -> Self {
        Self { inner }
    }
}

impl<A, T> Future for ValueAwaiter<A>
where
    A: Future<Output = Outcome<T>>,
{
    type Output = anyhow::Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx).map(Outcome::value)
    }
}

/// Hands the callee's first resumption to its bound executor and resolves to
/// the [`Outcome`] once the callee's chain terminates.
///
/// Created by [`ReschedulingTask::co_await_try`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct RescheduleAwaiter<T> {
    task: Option<ReschedulingTask<T>>,
    slot: Option<Arc<Slot<T>>>,
}

impl<T> RescheduleAwaiter<T> {
    pub(crate) fn new(task: ReschedulingTask<T>) -> Self {
        Self {
            task: Some(task),
            slot: None,
        }
    }
}

impl<T: Send + 'static> Future for RescheduleAwaiter<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(task) = self.task.take() {
            let slot = Arc::new(Slot::new(cx.waker().clone()));
            let tx = slot.clone();
            self.slot = Some(slot);

            // May complete synchronously if the executor runs work inline.
            Driver::launch(task.into_frame(), Box::new(move |outcome| tx.complete(outcome)));
        }

        let Some(slot) = self.slot.as_ref() else {
            panic!("`RescheduleAwaiter` polled after completion");
        };

        match slot.poll_outcome(cx.waker()) {
            Poll::Ready(outcome) => {
                self.slot = None;
                Poll::Ready(outcome)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for RescheduleAwaiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RescheduleAwaiter")
            .field("task", &self.task)
            .field("started", &self.slot.is_some())
            .finish()
    }
}

/// Hand-off point between the callee's driver (writer) and the suspended
/// caller (reader).
struct Slot<T> {
    state: Mutex<SlotState<T>>,
}

struct SlotState<T> {
    outcome: Option<Outcome<T>>,
    waker: Option<Waker>,
}

impl<T> Slot<T> {
    fn new(waker: Waker) -> Self {
        Self {
            state: Mutex::new(SlotState {
                outcome: None,
                waker: Some(waker),
            }),
        }
    }

    fn complete(&self, outcome: Outcome<T>) {
        let waker = {
            let mut state = self.state.lock();
            state.outcome = Some(outcome);
            state.waker.take()
        };

        // Wake outside the lock, the caller may be resumed inline right here.
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn poll_outcome(&self, waker: &Waker) -> Poll<Outcome<T>> {
        let mut state = self.state.lock();

        if let Some(outcome) = state.outcome.take() {
            return Poll::Ready(outcome);
        }

        if !state.waker.as_ref().is_some_and(|w| w.will_wake(waker)) {
            state.waker = Some(waker.clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Task;
    use crate::test_utils::*;
    use anyhow::anyhow;
    use futures::task::noop_waker;
    use static_assertions::assert_impl_all;

    assert_impl_all!(TryAwaiter<u32>: Send, Unpin);
    assert_impl_all!(RescheduleAwaiter<u32>: Send, Unpin);
    assert_impl_all!(ValueAwaiter<TryAwaiter<u32>>: Send, Unpin);

    #[test]
    fn test_try_awaiter_inline() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut awaiter = Task::new(async { Ok(9) }).co_await_try();
        match Pin::new(&mut awaiter).poll(&mut cx) {
            Poll::Ready(outcome) => assert_eq!(outcome.value().unwrap(), 9),
            Poll::Pending => panic!("inline task should complete in one poll"),
        }
    }

    #[test]
    fn test_try_awaiter_keeps_failure_in_capsule() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut awaiter = Task::<()>::new(async { Err(anyhow!("bad")) }).co_await_try();
        let Poll::Ready(outcome) = Pin::new(&mut awaiter).poll(&mut cx) else {
            panic!("expected ready");
        };
        assert!(outcome.is_failure());
    }

    #[test]
    #[should_panic(expected = "polled after completion")]
    fn test_try_awaiter_polled_twice_panics() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut awaiter = Task::new(async { Ok(()) }).co_await_try();
        let _ = Pin::new(&mut awaiter).poll(&mut cx);
        let _ = Pin::new(&mut awaiter).poll(&mut cx);
    }

    #[test]
    fn test_reschedule_awaiter_waits_for_executor() {
        let spy = Arc::new(SpyExecutor::default());
        let counter = WakeCounter::new();
        let waker = counter.waker();
        let mut cx = Context::from_waker(&waker);

        let mut awaiter = Task::new(async { Ok(1) })
            .set_executor(spy.clone())
            .co_await_try();

        assert!(Pin::new(&mut awaiter).poll(&mut cx).is_pending());
        assert_eq!(spy.num_pushed(), 1);
        assert_eq!(counter.wakes(), 0);

        spy.run_all();
        assert_eq!(counter.wakes(), 1);

        let Poll::Ready(outcome) = Pin::new(&mut awaiter).poll(&mut cx) else {
            panic!("expected ready after the executor ran the callee");
        };
        assert_eq!(outcome.value().unwrap(), 1);
    }

    #[test]
    fn test_reschedule_awaiter_with_inline_executor() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut awaiter = Task::new(async { Ok("inline") })
            .set_executor(Arc::new(InlineExecutor))
            .co_await_try();

        let Poll::Ready(outcome) = Pin::new(&mut awaiter).poll(&mut cx) else {
            panic!("inline executor completes the callee during the first poll");
        };
        assert_eq!(outcome.value().unwrap(), "inline");
    }

    #[test]
    fn test_value_awaiter_extracts() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut ok = std::pin::pin!(ValueAwaiter::new(Task::new(async { Ok(2) }).co_await_try()));
        assert!(matches!(ok.as_mut().poll(&mut cx), Poll::Ready(Ok(2))));

        let mut err = std::pin::pin!(ValueAwaiter::new(
            Task::<u8>::new(async { Err(anyhow!("x")) }).co_await_try()
        ));
        assert!(matches!(err.as_mut().poll(&mut cx), Poll::Ready(Err(_))));
    }
}
