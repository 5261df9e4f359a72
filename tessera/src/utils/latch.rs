use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// One-shot release/acquire signal.
///
/// Starts closed. `release` opens it for good and wakes every waiter; waiting
/// on an open latch returns immediately.
#[derive(Debug, Default)]
pub(crate) struct Latch {
    released: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn release(&self) {
        let mut released = self.released.lock();
        *released = true;
        self.cv.notify_all();
    }

    pub(crate) fn is_released(&self) -> bool {
        *self.released.lock()
    }

    pub(crate) fn wait(&self) {
        let mut released = self.released.lock();
        while !*released {
            self.cv.wait(&mut released);
        }
    }

    /// Returns true if the latch was released before `timeout` elapsed.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut released = self.released.lock();
        if !*released {
            // `wait_while_for` handles spurious wakeups.
            self.cv
                .wait_while_for(&mut released, |released| !*released, timeout);
        }
        *released
    }
}
