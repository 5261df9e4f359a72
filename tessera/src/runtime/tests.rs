use super::*;
use crate::test_utils::*;
use anyhow::Result;
use parking_lot::Mutex;
use rstest::rstest;
use static_assertions::assert_impl_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

assert_impl_all!(ThreadPool: Executor, Send, Sync);
assert_impl_all!(EventLoopExecutor<EventLoop>: Executor);

const TIMEOUT: Duration = Duration::from_secs(5);

fn current_thread_name() -> String {
    thread::current().name().unwrap_or_default().to_string()
}

#[test]
fn test_new_rejects_zero_workers() {
    let err = ThreadPool::new(0).unwrap_err();
    assert_eq!(err.to_string(), "worker_threads must be greater than 0");
}

#[rstest]
#[case(1)]
#[case(3)]
fn test_pool_starts_all_workers(#[case] n: usize) -> Result<()> {
    let pool = ThreadPool::new(n)?;
    assert_eq!(pool.num_workers(), n);
    assert_eq!(pool.num_queued(), 0);
    assert!(!pool.is_stopped());
    Ok(())
}

#[test]
fn test_single_worker_runs_fifo() -> Result<()> {
    let pool = ThreadPool::new(1)?;
    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    for i in 0..100 {
        let order = order.clone();
        pool.push(Box::new(move || order.lock().push(i)));
    }
    pool.push(Box::new(move || tx.send(()).unwrap()));

    rx.recv_timeout(TIMEOUT)?;
    assert_eq!(*order.lock(), (0..100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_worker_can_push_to_its_own_pool() -> Result<()> {
    let pool = ThreadPool::new(1)?;
    let (tx, rx) = mpsc::channel();

    let inner = pool.clone();
    pool.push(Box::new(move || {
        inner.push(Box::new(move || tx.send(current_thread_name()).unwrap()));
    }));

    assert_eq!(rx.recv_timeout(TIMEOUT)?, "tessera-worker-0");
    Ok(())
}

#[test]
fn test_panicking_work_keeps_worker_alive() -> Result<()> {
    init_tracing();
    let pool = ThreadPool::new(1)?;
    let (tx, rx) = mpsc::channel();

    pool.push(Box::new(|| panic!("bad work item")));
    pool.push(Box::new(move || tx.send(()).unwrap()));

    rx.recv_timeout(TIMEOUT)?;
    Ok(())
}

#[test]
fn test_stop_drops_queued_work() -> Result<()> {
    init_tracing();
    let pool = ThreadPool::new(1)?;
    let (release, blocked) = mpsc::channel::<()>();
    let (started_tx, started) = mpsc::channel();

    pool.push(Box::new(move || {
        started_tx.send(()).unwrap();
        let _ = blocked.recv();
    }));
    started.recv_timeout(TIMEOUT)?;

    let sentinel = DropSentinel::new();
    let ran = Arc::new(AtomicBool::new(false));
    for _ in 0..3 {
        let guard = sentinel.clone();
        let ran = ran.clone();
        pool.push(Box::new(move || {
            let _guard = guard;
            ran.store(true, Ordering::SeqCst);
        }));
    }
    assert_eq!(pool.num_queued(), 3);

    pool.stop();
    assert!(pool.is_stopped());
    assert_eq!(pool.num_queued(), 0);
    assert_eq!(sentinel.drops(), 3);

    // Stopping twice is harmless.
    pool.stop();

    release.send(())?;
    drop(pool);
    assert!(!ran.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn test_push_after_stop_is_dropped() -> Result<()> {
    let pool = ThreadPool::new(2)?;
    pool.stop();

    let sentinel = DropSentinel::new();
    let guard = sentinel.clone();
    pool.push(Box::new(move || {
        let _guard = guard;
        panic!("must not run");
    }));

    assert_eq!(sentinel.drops(), 1);
    assert_eq!(pool.num_queued(), 0);
    Ok(())
}

#[test]
fn test_drop_waits_for_running_work() -> Result<()> {
    let pool = ThreadPool::new(2)?;
    let done = Arc::new(AtomicBool::new(false));
    let (started_tx, started) = mpsc::channel();

    let flag = done.clone();
    pool.push(Box::new(move || {
        started_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
    }));

    started.recv_timeout(TIMEOUT)?;
    drop(pool);

    assert!(done.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn test_thread_names() -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let pool = Builder::new().worker_threads(2).thread_name("io").try_build()?;
    for _ in 0..4 {
        let tx = tx.clone();
        pool.push(Box::new(move || tx.send(current_thread_name()).unwrap()));
    }
    for _ in 0..4 {
        assert_eq!(rx.recv_timeout(TIMEOUT)?, "io");
    }

    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let pool = Builder::new()
        .worker_threads(1)
        .thread_name_fn(move || format!("custom-{}", counter.fetch_add(1, Ordering::SeqCst)))
        .try_build()?;
    let tx = tx.clone();
    pool.push(Box::new(move || tx.send(current_thread_name()).unwrap()));
    assert_eq!(rx.recv_timeout(TIMEOUT)?, "custom-0");
    Ok(())
}

#[test]
fn test_block_on_returns_output() -> Result<()> {
    let pool = ThreadPool::new(2)?;

    let name = pool.block_on(async { current_thread_name() });
    assert!(name.starts_with("tessera-worker-"));

    let sum = pool.block_on(async {
        let mut sum = 0;
        for i in 0..10 {
            YieldOnce::default().await;
            sum += i;
        }
        sum
    });
    assert_eq!(sum, 45);
    Ok(())
}

#[test]
#[should_panic(expected = "exploded in block_on")]
fn test_block_on_propagates_panic() {
    let pool = ThreadPool::new(1).unwrap();
    pool.block_on(async { panic!("exploded in block_on") })
}

#[test]
fn test_pool_as_trait_object() -> Result<()> {
    let executor: Arc<dyn Executor> = ThreadPool::new(1)?;
    let (tx, rx) = mpsc::channel();

    executor.push(Box::new(move || tx.send(7).unwrap()));
    assert_eq!(rx.recv_timeout(TIMEOUT)?, 7);
    Ok(())
}
