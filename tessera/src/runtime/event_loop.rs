use crate::runtime::{Executor, Work};
use crate::utils::ScopeGuard;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// The capability an externally owned event loop exposes: accept a handler
/// and run it later on whichever thread drives the loop.
pub trait Reactor: Send + Sync + 'static {
    fn post(&self, work: Work);
}

/// [`Executor`] that forwards every push to a [`Reactor`]. It owns no
/// threads: work runs when, and where, the reactor is driven.
pub struct EventLoopExecutor<R> {
    reactor: Arc<R>,
}

impl<R: Reactor> EventLoopExecutor<R> {
    pub fn new(reactor: Arc<R>) -> Self {
        Self { reactor }
    }

    pub fn reactor(&self) -> &Arc<R> {
        &self.reactor
    }
}

impl<R: Reactor> Executor for EventLoopExecutor<R> {
    fn push(&self, work: Work) {
        self.reactor.post(work);
    }
}

impl<R> fmt::Debug for EventLoopExecutor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoopExecutor").finish_non_exhaustive()
    }
}

/// A minimal [`Reactor`]: a FIFO of handlers run by whichever threads call
/// [`run`](Self::run), [`run_one`](Self::run_one) or [`poll`](Self::poll).
///
/// `run` returns once the loop is out of work, i.e. the queue is empty, no
/// handler is executing on any thread and no [`WorkGuard`] is alive, or once [`stop`](Self::stop) is called. Either way
/// the loop is left stopped and must be [`restart`](Self::restart)ed before it
/// runs handlers again. Handlers posted while the loop is stopped stay queued.
///
/// ```
/// use std::sync::Arc;
/// use tessera::runtime::{EventLoop, Reactor};
///
/// let ev = Arc::new(EventLoop::new());
/// ev.post(Box::new(|| println!("hello from the loop")));
/// assert_eq!(ev.run(), 1);
/// assert!(ev.is_stopped());
/// ```
pub struct EventLoop {
    state: Mutex<LoopState>,
    cv: Condvar,
}

#[derive(Default)]
struct LoopState {
    queue: VecDeque<Work>,
    stopped: bool,
    guards: usize,

    // Handlers dequeued but not returned yet. A running handler may still post.
    running: usize,
}

impl LoopState {
    fn out_of_work(&self) -> bool {
        self.queue.is_empty() && self.guards == 0 && self.running == 0
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::default()),
            cv: Condvar::new(),
        }
    }

    /// Runs handlers until the loop is stopped or out of work. Returns how
    /// many handlers ran.
    pub fn run(&self) -> usize {
        let mut count = 0;
        while let Some(work) = self.next(true) {
            self.execute(work);
            count += 1;
        }
        trace!(handlers = count, "event loop run returned");
        count
    }

    /// Runs at most one handler, blocking while the loop is idle but kept
    /// alive by a [`WorkGuard`]. Returns how many handlers ran.
    pub fn run_one(&self) -> usize {
        match self.next(true) {
            Some(work) => {
                self.execute(work);
                1
            }
            None => 0,
        }
    }

    /// Runs every handler that is ready without blocking. Returns how many
    /// handlers ran.
    pub fn poll(&self) -> usize {
        let mut count = 0;
        while let Some(work) = self.next(false) {
            self.execute(work);
            count += 1;
        }
        count
    }

    /// Makes every `run`/`run_one` return as soon as the handler it is
    /// currently executing, if any, returns.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.stopped {
            state.stopped = true;
            self.cv.notify_all();
            debug!("event loop stopped");
        }
    }

    /// Clears the stopped flag so the loop runs handlers again.
    pub fn restart(&self) {
        self.state.lock().stopped = false;
    }

    /// Returns true once the loop was stopped or ran out of work.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Keeps [`run`](Self::run) from returning while the queue is empty, until
    /// the guard is dropped.
    pub fn work_guard(self: &Arc<Self>) -> WorkGuard {
        self.state.lock().guards += 1;
        WorkGuard { ev: self.clone() }
    }

    /// Dequeues the next handler, or returns `None` once the loop is stopped
    /// or out of work.
    fn next(&self, block: bool) -> Option<Work> {
        let mut state = self.state.lock();

        loop {
            if state.stopped {
                return None;
            }
            if let Some(work) = state.queue.pop_front() {
                state.running += 1;
                return Some(work);
            }
            if state.out_of_work() {
                // Out of work, same as an explicit stop.
                state.stopped = true;
                self.cv.notify_all();
                return None;
            }
            if !block {
                return None;
            }
            self.cv.wait(&mut state);
        }
    }

    /// Runs a handler obtained from [`next`](Self::next).
    fn execute(&self, work: Work) {
        let _done = ScopeGuard::new(|| {
            let mut state = self.state.lock();
            state.running -= 1;
            if state.out_of_work() {
                self.cv.notify_all();
            }
        });
        work();
    }
}

impl Reactor for EventLoop {
    fn post(&self, work: Work) {
        self.state.lock().queue.push_back(work);
        self.cv.notify_one();
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventLoop")
            .field("queued", &state.queue.len())
            .field("stopped", &state.stopped)
            .field("guards", &state.guards)
            .finish()
    }
}

/// Keeps an [`EventLoop`] running while idle. See
/// [`EventLoop::work_guard`].
#[must_use = "the loop may return as soon as the guard is dropped"]
pub struct WorkGuard {
    ev: Arc<EventLoop>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        let mut state = self.ev.state.lock();
        state.guards -= 1;
        if state.guards == 0 {
            self.ev.cv.notify_all();
        }
    }
}

impl fmt::Debug for WorkGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Task, sync_await};
    use anyhow::Result;
    use static_assertions::assert_impl_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    assert_impl_all!(EventLoop: Send, Sync, Reactor);
    assert_impl_all!(EventLoopExecutor<EventLoop>: Send, Sync, Executor);

    fn counting(ev: &EventLoop, n: usize) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..n {
            let hits = hits.clone();
            ev.post(Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        hits
    }

    #[test]
    fn test_run_drains_then_stops() {
        let ev = EventLoop::new();
        let hits = counting(&ev, 3);

        assert_eq!(ev.run(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(ev.is_stopped());

        // Stopped loops keep queued handlers until restarted.
        let hits = counting(&ev, 1);
        assert_eq!(ev.run(), 0);
        ev.restart();
        assert_eq!(ev.run(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_one_and_poll() {
        let ev = EventLoop::new();
        let hits = counting(&ev, 3);

        assert_eq!(ev.run_one(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(ev.poll(), 2);
        assert_eq!(ev.poll(), 0);
    }

    #[test]
    fn test_fifo_order() {
        let ev = EventLoop::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            ev.post(Box::new(move || order.lock().push(i)));
        }
        ev.run();

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_work_guard_keeps_run_alive() {
        let ev = Arc::new(EventLoop::new());
        let guard = ev.work_guard();

        let runner = {
            let ev = ev.clone();
            thread::spawn(move || ev.run())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!runner.is_finished());

        ev.post(Box::new(|| {}));
        drop(guard);

        assert_eq!(runner.join().unwrap(), 1);
    }

    #[test]
    fn test_running_handler_keeps_other_runners_alive() {
        let ev = Arc::new(EventLoop::new());
        let second_ran = Arc::new(AtomicUsize::new(0));
        let (started_tx, started) = std::sync::mpsc::channel();

        {
            let ev2 = ev.clone();
            let second_ran = second_ran.clone();
            ev.post(Box::new(move || {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                ev2.post(Box::new(move || {
                    second_ran.fetch_add(1, Ordering::SeqCst);
                }));
            }));
        }

        let first = {
            let ev = ev.clone();
            thread::spawn(move || ev.run())
        };
        started.recv().unwrap();

        // Queue is empty and no guard is alive, but the first handler is
        // still executing.
        let second = {
            let ev = ev.clone();
            thread::spawn(move || ev.run())
        };

        let handled = first.join().unwrap() + second.join().unwrap();
        assert_eq!(handled, 2);
        assert_eq!(second_ran.load(Ordering::SeqCst), 1);
        assert!(ev.is_stopped());
        assert_eq!(ev.state.lock().queue.len(), 0);
        assert_eq!(ev.state.lock().running, 0);
    }

    #[test]
    fn test_poll_does_not_stop_while_handler_runs() {
        let ev = Arc::new(EventLoop::new());
        let (started_tx, started) = std::sync::mpsc::channel();
        let (release, blocked) = std::sync::mpsc::channel::<()>();

        ev.post(Box::new(move || {
            started_tx.send(()).unwrap();
            let _ = blocked.recv();
        }));

        let runner = {
            let ev = ev.clone();
            thread::spawn(move || ev.run())
        };
        started.recv().unwrap();

        assert_eq!(ev.poll(), 0);
        assert!(!ev.is_stopped());

        release.send(()).unwrap();
        assert_eq!(runner.join().unwrap(), 1);
        assert!(ev.is_stopped());
    }

    #[test]
    fn test_stop_wakes_blocked_run() {
        let ev = Arc::new(EventLoop::new());
        let _guard = ev.work_guard();

        let runner = {
            let ev = ev.clone();
            thread::spawn(move || ev.run())
        };

        thread::sleep(Duration::from_millis(10));
        ev.stop();
        assert_eq!(runner.join().unwrap(), 0);
    }

    #[test]
    fn test_task_bound_to_event_loop() -> Result<()> {
        let ev = Arc::new(EventLoop::new());
        let guard = ev.work_guard();
        let executor = Arc::new(EventLoopExecutor::new(ev.clone()));

        let runner = {
            let ev = ev.clone();
            thread::spawn(move || {
                ev.run();
                thread::current().id()
            })
        };

        let task = Task::new(async { Ok(thread::current().id()) }).set_executor(executor);
        let ran_on = sync_await(task)?;

        drop(guard);
        assert_eq!(runner.join().unwrap(), ran_on);
        Ok(())
    }
}
