use crate::task::TaskError;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use tracing::trace;

/// Suspends the awaiting task on a callback-style operation.
///
/// On first poll, `initiate` is called with a [`ResumeSignal`] and a
/// [`ResultSetter`]. The operation stores its result through the setter, then
/// fires the signal; the awaiter resolves to that result. The signal may fire
/// from any thread, including synchronously from inside `initiate`, and the
/// awaiting task resumes on the thread that fires it.
///
/// - Firing the signal without setting a value resolves to
///   [`TaskError::NoValue`].
/// - Dropping the signal without firing it resolves to
///   [`TaskError::ResumeDropped`], so a lost callback cannot hang the task.
///
/// ```
/// use tessera::future::CallbackAwaiter;
/// use tessera::{Task, sync_await};
///
/// fn async_double(x: u32, done: impl FnOnce(u32) + Send + 'static) {
///     std::thread::spawn(move || done(x * 2));
/// }
///
/// let task = Task::new(async {
///     CallbackAwaiter::new(|resume, setter| {
///         async_double(21, move |v| {
///             setter.set(v);
///             resume.resume();
///         })
///     })
///     .await
/// });
///
/// assert_eq!(sync_await(task).unwrap(), 42);
/// ```
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct CallbackAwaiter<T, F> {
    initiate: Option<F>,
    shared: Option<Arc<Shared<T>>>,
}

impl<T, F> CallbackAwaiter<T, F>
where
    T: Send + 'static,
    F: FnOnce(ResumeSignal, ResultSetter<T>),
{
    pub fn new(initiate: F) -> Self {
        Self {
            initiate: Some(initiate),
            shared: Some(Arc::new(Shared::default())),
        }
    }
}

// `initiate` is only ever moved out, never polled in place.
impl<T, F> Unpin for CallbackAwaiter<T, F> {}

impl<T, F> Future for CallbackAwaiter<T, F>
where
    T: Send + 'static,
    F: FnOnce(ResumeSignal, ResultSetter<T>),
{
    type Output = anyhow::Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let Some(shared) = this.shared.as_ref() else {
            panic!("`CallbackAwaiter` polled after completion");
        };

        if let Some(initiate) = this.initiate.take() {
            trace!("initiate callback operation");

            // Register first: the operation may complete inside `initiate`.
            shared.state.lock().waker = Some(cx.waker().clone());
            initiate(
                ResumeSignal::new(shared.clone()),
                ResultSetter {
                    shared: shared.clone(),
                },
            );
        }

        let res: anyhow::Result<T> = {
            let mut state = shared.state.lock();
            match state.signal {
                Signal::Pending => {
                    if !state.waker.as_ref().is_some_and(|w| w.will_wake(cx.waker())) {
                        state.waker = Some(cx.waker().clone());
                    }
                    return Poll::Pending;
                }
                Signal::Resumed => state.value.take().ok_or_else(|| TaskError::NoValue.into()),
                Signal::Dropped => Err(TaskError::ResumeDropped.into()),
            }
        };

        this.shared = None;
        Poll::Ready(res)
    }
}

impl<T, F> fmt::Debug for CallbackAwaiter<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackAwaiter")
            .field("initiated", &self.initiate.is_none())
            .field("complete", &self.shared.is_none())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    Resumed,
    Dropped,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    value: Option<T>,
    signal: Signal,
    waker: Option<Waker>,
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                value: None,
                signal: Signal::Pending,
                waker: None,
            }),
        }
    }
}

/// Type-erased view of [`Shared`] used by [`ResumeSignal`].
trait Notify: Send + Sync {
    fn notify(&self, signal: Signal);
}

impl<T: Send> Notify for Shared<T> {
    fn notify(&self, signal: Signal) {
        let waker = {
            let mut state = self.state.lock();
            debug_assert_eq!(state.signal, Signal::Pending);
            state.signal = signal;
            state.waker.take()
        };

        // Outside the lock, the awaiting task may resume right here.
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// One-shot signal resuming the task suspended on a [`CallbackAwaiter`].
pub struct ResumeSignal {
    shared: Option<Arc<dyn Notify>>,
}

impl ResumeSignal {
    fn new<T: Send + 'static>(shared: Arc<Shared<T>>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// Resumes the suspended task with whatever was last stored through the
    /// [`ResultSetter`].
    pub fn resume(mut self) {
        if let Some(shared) = self.shared.take() {
            trace!("resume callback awaiter");
            shared.notify(Signal::Resumed);
        }
    }
}

impl Drop for ResumeSignal {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            trace!("resume signal dropped unfired");
            shared.notify(Signal::Dropped);
        }
    }
}

impl fmt::Debug for ResumeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeSignal").finish_non_exhaustive()
    }
}

/// Stores the result of the operation a [`CallbackAwaiter`] waits on.
pub struct ResultSetter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ResultSetter<T> {
    /// Stores `value`, replacing any previous one. Call before firing the
    /// [`ResumeSignal`].
    pub fn set(&self, value: T) {
        trace!("set value");
        self.shared.state.lock().value = Some(value);
    }
}

impl<T> Clone for ResultSetter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for ResultSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSetter").finish_non_exhaustive()
    }
}
