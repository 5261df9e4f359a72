use crate::task::Id;
use crate::utils::Latch;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handle to a chain started with [`start`].
///
/// The chain's result goes to the completion callback given to `start`; this
/// handle only tracks *whether* the chain has finished. Dropping it does not
/// cancel anything, the chain keeps running in the background.
///
/// A chain counts as finished once its completion callback has returned, no
/// matter whether it delivered a value, a failure, or an
/// [abandonment](crate::task::TaskError::Abandoned).
///
/// [`start`]: crate::ReschedulingTask::start
#[derive(Clone)]
pub struct Detached {
    id: Id,
    latch: Arc<Latch>,
}

impl Detached {
    pub(crate) fn new(id: Id) -> Self {
        Self {
            id,
            latch: Arc::new(Latch::new()),
        }
    }

    /// Handle for a chain that finished without ever running.
    pub(crate) fn finished(id: Id) -> Self {
        let detached = Self::new(id);
        detached.latch.release();
        detached
    }

    pub(crate) fn latch(&self) -> Arc<Latch> {
        self.latch.clone()
    }

    /// Returns the [`Id`] of the task this handle tracks.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns true once the completion callback has returned.
    pub fn is_finished(&self) -> bool {
        self.latch.is_released()
    }

    /// Blocks the current thread until the chain finished.
    ///
    /// Never call this from a thread the chain needs in order to make progress
    /// (e.g. the only worker of the pool it is bound to).
    pub fn wait(&self) {
        self.latch.wait()
    }

    /// Same as [`wait`](Self::wait) but gives up after `timeout`. Returns true
    /// if the chain finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout)
    }
}

impl fmt::Debug for Detached {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Detached")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
