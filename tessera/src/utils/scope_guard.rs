/// Runs a closure when dropped, whether the scope is left normally or by a
/// panic unwinding through it.
///
/// Used wherever a release step must happen after a user callback, even a
/// panicking one: releasing a [`Detached`](crate::task::Detached) latch,
/// untracking a chain from a [`TaskRegistry`](crate::runtime::TaskRegistry).
pub(crate) struct ScopeGuard<F: FnOnce()> {
    // Taken on drop so the closure runs at most once.
    closure: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    pub(crate) fn new(closure: F) -> Self {
        ScopeGuard {
            closure: Some(closure),
        }
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(closure) = self.closure.take() {
            closure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_on_scope_exit() {
        let hits = AtomicUsize::new(0);
        {
            let _guard = ScopeGuard::new(|| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(hits.load(Ordering::SeqCst), 0);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runs_on_unwind() {
        let hits = AtomicUsize::new(0);

        let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let _guard = ScopeGuard::new(|| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            panic!("callback failed");
        }));

        assert!(res.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
