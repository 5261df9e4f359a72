use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// Exports
pub(crate) mod future;
pub(crate) use future::{ManualGate, YieldOnce};

pub(crate) mod mocks;
pub(crate) use mocks::{InlineExecutor, WakeCounter};

pub(crate) mod spy;
pub(crate) use spy::SpyExecutor;

/// Counts how many of its clones have been dropped. Move a clone into a task
/// body to observe when the body's captured state is torn down.
#[derive(Debug)]
pub(crate) struct DropSentinel {
    drops: Arc<AtomicUsize>,
}

impl DropSentinel {
    pub(crate) fn new() -> Self {
        Self {
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl Clone for DropSentinel {
    fn clone(&self) -> Self {
        Self {
            drops: self.drops.clone(),
        }
    }
}

impl Drop for DropSentinel {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call many times.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
