//! Promise state store
//!
//! Settlement records keyed by promise identity. Entries are never removed for
//! the lifetime of a session, so a promise that settled during pass N is
//! answered directly in pass N+1.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::promise::{Promise, PromiseId, PromiseState};

#[derive(Default)]
struct StoreInner {
    states: Mutex<HashMap<PromiseId, PromiseState>>,
    resources: Mutex<HashMap<String, Promise>>,
}

/// Per-session map from promise identity to its last known state
#[derive(Clone, Default)]
pub struct PromiseStateStore {
    inner: Arc<StoreInner>,
}

/// Create an empty store for a new session
pub fn create_promise_state_manager() -> PromiseStateStore {
    PromiseStateStore::new()
}

impl PromiseStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PromiseId) -> Option<PromiseState> {
        self.inner.states.lock().get(&id).cloned()
    }

    /// Last write wins
    pub fn set(&self, id: PromiseId, state: PromiseState) {
        self.inner.states.lock().insert(id, state);
    }

    pub fn len(&self) -> usize {
        self.inner.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the session's promise for `key`, creating it with `make` on first use
    ///
    /// Lets a component start an async dependency once per session instead of
    /// once per pass. `make` runs without any store lock held.
    pub fn promise_for<F>(&self, key: &str, make: F) -> Promise
    where
        F: FnOnce() -> Promise,
    {
        if let Some(existing) = self.inner.resources.lock().get(key) {
            return existing.clone();
        }

        let created = make();
        self.inner
            .resources
            .lock()
            .entry(key.to_string())
            .or_insert(created)
            .clone()
    }

    /// Write the promise's final state into the store once it settles
    pub(crate) fn record_settlement(&self, promise: &Promise) {
        let id = promise.id();
        let store: Weak<StoreInner> = Arc::downgrade(&self.inner);
        promise.on_settle(move |state| {
            if let Some(inner) = store.upgrade() {
                inner.states.lock().insert(id, state.clone());
            }
        });
    }
}
