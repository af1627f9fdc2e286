//! Completion tracker
//!
//! Remembers every promise a session has observed and whether it has settled.
//! Rejection counts as settled here; the rejection itself surfaces through the
//! hook on the next pass.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::promise::{Promise, PromiseId};

struct Tracked {
    promise: Promise,
    settled: bool,
}

#[derive(Default)]
struct TrackerState {
    entries: Vec<Tracked>,
    ids: HashSet<PromiseId>,
}

impl TrackerState {
    /// Returns true if the entry went from pending to settled
    fn mark_settled(&mut self, id: PromiseId) -> bool {
        match self.entries.iter_mut().find(|e| e.promise.id() == id) {
            Some(entry) if !entry.settled => {
                entry.settled = true;
                true
            }
            _ => false,
        }
    }
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    /// Number of tracked promises that have settled, only ever grows
    settled_tx: watch::Sender<usize>,
}

impl Default for TrackerInner {
    fn default() -> Self {
        let (settled_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(TrackerState::default()),
            settled_tx,
        }
    }
}

/// Set of promises observed during a session, in first-seen order
#[derive(Clone, Default)]
pub struct PromiseTracker {
    inner: Arc<TrackerInner>,
}

/// Create an empty tracker for a new session
pub fn create_promise_tracker() -> PromiseTracker {
    PromiseTracker::new()
}

impl PromiseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `promise`. Returns false if it was already tracked.
    pub fn track(&self, promise: &Promise) -> bool {
        {
            let mut state = self.inner.state.lock();
            if !state.ids.insert(promise.id()) {
                return false;
            }
            state.entries.push(Tracked {
                promise: promise.clone(),
                settled: false,
            });
        }

        // May run immediately if the promise already settled, so no lock is held here.
        let id = promise.id();
        let tracker: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        promise.on_settle(move |_| {
            if let Some(inner) = tracker.upgrade() {
                let mut state = inner.state.lock();
                if state.mark_settled(id) {
                    inner.settled_tx.send_modify(|count| *count += 1);
                }
            }
        });
        true
    }

    pub fn track_promises<'a, I>(&self, promises: I)
    where
        I: IntoIterator<Item = &'a Promise>,
    {
        for promise in promises {
            self.track(promise);
        }
    }

    pub fn are_all_resolved(&self) -> bool {
        self.inner.state.lock().entries.iter().all(|e| e.settled)
    }

    pub fn has_pending_promises(&self) -> bool {
        !self.are_all_resolved()
    }

    /// Tracked promises that have not settled yet
    pub fn get_pending_promises(&self) -> Vec<Promise> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| !e.settled)
            .map(|e| e.promise.clone())
            .collect()
    }

    /// Number of tracked promises that have settled
    pub fn settled_count(&self) -> usize {
        *self.inner.settled_tx.borrow()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least one currently pending promise settles
    ///
    /// Completes immediately when nothing is pending. When it completes, the
    /// tracker has already recorded the settlement.
    pub async fn wait_for_any_resolution(&self) {
        let seen = self.settled_count();
        if !self.has_pending_promises() {
            return;
        }
        self.wait_for_settled_beyond(seen).await;
    }

    /// Wait until more than `seen` tracked promises have settled
    ///
    /// Completes immediately if that already happened, so a settlement between
    /// reading the count and calling this is never missed.
    pub async fn wait_for_settled_beyond(&self, seen: usize) {
        let mut settled = self.inner.settled_tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = settled.wait_for(|count| *count > seen).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_track_is_idempotent() {
        let tracker = create_promise_tracker();
        let (promise, _resolver) = Promise::deferred();

        assert!(tracker.track(&promise));
        assert!(!tracker.track(&promise));
        tracker.track_promises([&promise, &promise.clone()]);

        assert_eq!(tracker.len(), 1);
        assert_eq!(promise.continuation_count(), 1);
    }

    #[test]
    fn test_rejection_counts_as_settled() {
        let tracker = PromiseTracker::new();
        let (ok, ok_resolver) = Promise::deferred();
        let (bad, bad_resolver) = Promise::deferred();
        tracker.track_promises([&ok, &bad]);

        assert!(tracker.has_pending_promises());
        assert_eq!(tracker.get_pending_promises(), vec![ok.clone(), bad.clone()]);

        bad_resolver.reject("boom");
        assert_eq!(tracker.get_pending_promises(), vec![ok.clone()]);
        assert!(!tracker.are_all_resolved());

        assert_eq!(tracker.settled_count(), 1);

        ok_resolver.fulfill(1);
        assert!(tracker.are_all_resolved());
        assert!(tracker.get_pending_promises().is_empty());
    }

    #[test]
    fn test_already_settled_promise_is_settled_on_track() {
        let tracker = PromiseTracker::new();
        tracker.track(&Promise::fulfilled("ready"));
        assert!(tracker.are_all_resolved());
    }

    #[test]
    fn test_empty_tracker_is_resolved_and_does_not_wait() {
        let tracker = PromiseTracker::new();
        assert!(tracker.are_all_resolved());

        let mut wait = task::spawn(tracker.wait_for_any_resolution());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_wait_completes_on_first_settlement() {
        let tracker = PromiseTracker::new();
        let (slow, _slow_resolver) = Promise::deferred();
        let (fast, fast_resolver) = Promise::deferred();
        tracker.track_promises([&slow, &fast]);

        let mut wait = task::spawn(tracker.wait_for_any_resolution());
        assert_pending!(wait.poll());

        fast_resolver.fulfill("fast");
        assert!(wait.is_woken());
        assert_ready!(wait.poll());

        assert_eq!(tracker.get_pending_promises(), vec![slow]);
    }

    #[test]
    fn test_settlement_before_wait_is_not_missed() {
        let tracker = PromiseTracker::new();
        let (first, first_resolver) = Promise::deferred();
        let (second, _second_resolver) = Promise::deferred();
        tracker.track_promises([&first, &second]);
        let seen = tracker.settled_count();

        first_resolver.fulfill(1);
        first_resolver.fulfill(2);
        assert_eq!(tracker.settled_count(), 1);

        let mut wait = task::spawn(tracker.wait_for_settled_beyond(seen));
        assert_ready!(wait.poll());

        let mut next = task::spawn(tracker.wait_for_settled_beyond(tracker.settled_count()));
        assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn test_wait_for_spawned_promise() {
        let tracker = PromiseTracker::new();
        let promise = Promise::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("done".into())
        });
        tracker.track(&promise);

        tracker.wait_for_any_resolution().await;
        assert!(tracker.are_all_resolved());
    }
}
