use crate::task::{Outcome, Start};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Blocks the calling thread until `task` completes and returns its value, or
/// its failure as `Err`.
///
/// A [`ReschedulingTask`](crate::ReschedulingTask) runs on its executor; an
/// unbound [`Task`](crate::Task) runs on the calling thread until it first
/// suspends, then on whichever threads resume it.
///
/// Calling this from a worker of the pool the task is bound to deadlocks when
/// that pool has a single worker.
///
/// ```
/// use tessera::runtime::ThreadPool;
/// use tessera::{Task, sync_await};
///
/// let pool = ThreadPool::new(4).unwrap();
/// let task = Task::new(async { Ok(2 + 3) }).set_executor(pool);
/// assert_eq!(sync_await(task).unwrap(), 5);
/// ```
pub fn sync_await<S: Start>(task: S) -> anyhow::Result<S::Output> {
    let slot = Arc::new(Mutex::new(None));
    let tx = slot.clone();

    trace!(task.id = task.id().as_u64(), "sync_await");
    let detached = task.start(move |outcome| *tx.lock() = Some(outcome));
    detached.wait();

    let outcome: Outcome<S::Output> = slot.lock().take().unwrap_or_default();
    outcome.value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Task;
    use crate::task::TaskError;
    use crate::test_utils::*;
    use std::thread;

    #[test]
    fn test_unbound_task_runs_on_caller() -> anyhow::Result<()> {
        let caller = thread::current().id();
        let ran_on = sync_await(Task::new(async { Ok(thread::current().id()) }))?;

        assert_eq!(ran_on, caller);
        Ok(())
    }

    #[test]
    fn test_waits_for_other_thread() -> anyhow::Result<()> {
        let gate = ManualGate::new();
        let opener = gate.clone();

        let waiter = gate.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            opener.open();
        });

        let value = sync_await(Task::new(async move {
            waiter.await;
            Ok("opened")
        }))?;

        handle.join().unwrap();
        assert_eq!(value, "opened");
        Ok(())
    }

    #[test]
    fn test_abandoned_task_returns_error() {
        let spy = std::sync::Arc::new(SpyExecutor::default());
        let task = Task::new(async { Ok(()) }).set_executor(spy.clone());
        let id = task.id();

        let dropper = thread::spawn(move || {
            while spy.num_pushed() == 0 {
                thread::yield_now();
            }
            spy.drop_all();
        });

        let err = sync_await(task).unwrap_err();
        dropper.join().unwrap();
        assert_eq!(err.downcast_ref::<TaskError>(), Some(&TaskError::Abandoned { id }));
    }
}
