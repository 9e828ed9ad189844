//! Countdown latch usable from both blocking threads and async tasks.
//!
//! The scheduler uses it to learn that every concurrent camera has finished
//! *capturing*, independently of when their post-processing finishes.

use parking_lot::{Condvar, Mutex};
use std::borrow::Borrow;
use tokio::sync::Notify;

/// Releases waiters once `count_down` has been called `count` times.
#[derive(Debug)]
pub struct CountdownLatch {
    remaining: Mutex<usize>,
    released: Condvar,
    notify: Notify,
}

impl CountdownLatch {
    /// A latch with a count of zero is already released.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Decrement the count. Extra calls past zero are ignored.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.released.notify_all();
            self.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        *self.remaining.lock()
    }

    /// Block the current thread until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    /// Yield until the count reaches zero.
    pub async fn wait_async(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not lost.
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Counts a latch down when dropped, so a capture that errors or panics
/// still releases the waiter.
pub struct SignalOnDrop<L: Borrow<CountdownLatch>>(pub L);

impl<L: Borrow<CountdownLatch>> Drop for SignalOnDrop<L> {
    fn drop(&mut self) {
        self.0.borrow().count_down();
    }
}
