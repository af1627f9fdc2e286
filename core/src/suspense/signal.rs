//! Rerender signal
//!
//! A dirty flag shared between a render session and the components it renders.
//! Requesting a rerender makes the loop run one more pass even when every
//! tracked promise has settled. The session closes the signal when it ends;
//! requests on a closed signal are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
struct SignalInner {
    dirty: AtomicBool,
    closed: AtomicBool,
    notify: Notify,
}

#[derive(Clone, Default)]
pub struct RerenderSignal {
    inner: Arc<SignalInner>,
}

impl RerenderSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for another render pass. Returns false if the session has ended.
    pub fn request_rerender(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether a rerender had been requested
    pub fn take(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Wait until a rerender is requested or the signal is closed
    pub async fn requested(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_requested() || self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_take_clears_flag() {
        let signal = RerenderSignal::new();
        assert!(!signal.take());

        assert!(signal.request_rerender());
        assert!(signal.request_rerender());
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_closed_signal_ignores_requests() {
        let signal = RerenderSignal::new();
        signal.close();

        assert!(!signal.request_rerender());
        assert!(!signal.is_requested());
    }

    #[test]
    fn test_requested_wakes_waiter() {
        let signal = RerenderSignal::new();
        let mut wait = task::spawn(signal.requested());
        assert_pending!(wait.poll());

        signal.request_rerender();
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_close_wakes_waiter() {
        let signal = RerenderSignal::new();
        let mut wait = task::spawn(signal.requested());
        assert_pending!(wait.poll());

        signal.close();
        assert_ready!(wait.poll());
    }
}
