//! Bridges a callback-style timer into a task whose chain lives on an event
//! loop driven by the main thread.
//!
//! Run with `RUST_LOG=info cargo run --example timer`.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera::future::CallbackAwaiter;
use tessera::runtime::{EventLoop, EventLoopExecutor, Reactor};
use tessera::{Outcome, Task};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Completes after `delay`. The timer fires on a helper thread, which posts
/// the resumption back onto `event_loop`.
#[tessera::task]
async fn sleep(event_loop: Arc<EventLoop>, delay: Duration) -> Result<Duration> {
    let started = Instant::now();
    let guard = event_loop.work_guard();

    CallbackAwaiter::new(move |resume, setter| {
        thread::spawn(move || {
            thread::sleep(delay);
            setter.set(started.elapsed());

            event_loop.post(Box::new(move || {
                resume.resume();
                drop(guard);
            }));
        });
    })
    .await
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let event_loop = Arc::new(EventLoop::new());
    let executor = Arc::new(EventLoopExecutor::new(event_loop.clone()));

    let timers = event_loop.clone();
    let task = Task::new(async move {
        let mut total = Duration::ZERO;
        for ms in [10, 20, 30] {
            let elapsed = sleep(timers.clone(), Duration::from_millis(ms)).await?;
            info!(?elapsed, thread = ?thread::current().name(), "timer fired");
            total += elapsed;
        }
        Ok(total)
    })
    .set_executor(executor);

    let result = Arc::new(Mutex::new(Outcome::Empty));
    let slot = result.clone();
    let detached = task.start(move |outcome| *slot.lock() = outcome);

    // Returns once the chain is done and no timer is pending.
    let handled = event_loop.run();
    info!(handled, finished = detached.is_finished(), "event loop out of work");

    let total = result.lock().take().value()?;
    info!(?total, "all timers done");
    Ok(())
}
