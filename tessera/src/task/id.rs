use std::sync::atomic::{AtomicU64, Ordering};
use std::{fmt, num::NonZeroU64};

/// An opaque ID that uniquely identifies a task relative to all other tasks
/// created by this process.
///
/// # Notes
///
/// - Task IDs are handed out when the task is *created* (when the async
///   function is called), not when it first runs.
/// - IDs are never reused. They show up in logs, in [`TaskError`] variants and
///   as the key of a [`TaskRegistry`].
///
/// [`TaskError`]: crate::task::TaskError
/// [`TaskRegistry`]: crate::runtime::TaskRegistry
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Id(NonZeroU64);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Id {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        // Safety: this number is unimaginably large, even at 1 billion
        // task/sec it would take 584 years to wrap around.
        let Some(id) = NonZeroU64::new(id) else {
            Self::exhausted();
        };

        Self(id)
    }

    #[cold]
    fn exhausted() -> ! {
        panic!("failed to generate unique task ID: bitspace exhausted")
    }

    /// Raw numeric value, used as a structured field in tracing events.
    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}
