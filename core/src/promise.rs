//! Promise primitive
//!
//! A `Promise` is a shared, identity-keyed settlement cell. It starts `Pending`
//! and settles exactly once to `Fulfilled` or `Rejected`. Observers either attach
//! a synchronous continuation with [`Promise::on_settle`] or await
//! [`Promise::settled`].
//!
//! Continuations run inside the settling call, before any awaiting task is woken.
//! The render loop relies on this: by the time it observes a settlement, the
//! state store and the tracker have already recorded it.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::value::Val;

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/* ===================== Identity & State ===================== */

/// Identity of a promise. Two promises settling to equal values are still distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(u64);

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise#{}", self.0)
    }
}

/// Settlement record of a promise
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(Val),
    Rejected(Val),
}

impl PromiseState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, PromiseState::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, PromiseState::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, PromiseState::Rejected(_))
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromiseState::Pending => f.write_str("pending"),
            PromiseState::Fulfilled(_) => f.write_str("fulfilled"),
            PromiseState::Rejected(_) => f.write_str("rejected"),
        }
    }
}

impl From<Result<Val, Val>> for PromiseState {
    fn from(outcome: Result<Val, Val>) -> Self {
        match outcome {
            Ok(value) => PromiseState::Fulfilled(value),
            Err(reason) => PromiseState::Rejected(reason),
        }
    }
}

/* ===================== Promise ===================== */

type Continuation = Box<dyn FnOnce(&PromiseState) + Send>;

struct Slot {
    state: PromiseState,
    continuations: Vec<Continuation>,
}

struct Inner {
    id: PromiseId,
    slot: Mutex<Slot>,
    settled_tx: watch::Sender<bool>,
}

/// Shared handle to an asynchronous dependency
#[derive(Clone)]
pub struct Promise {
    inner: Arc<Inner>,
}

impl Promise {
    fn pending() -> Self {
        let id = PromiseId(NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed));
        let (settled_tx, _) = watch::channel(false);
        Promise {
            inner: Arc::new(Inner {
                id,
                slot: Mutex::new(Slot {
                    state: PromiseState::Pending,
                    continuations: Vec::new(),
                }),
                settled_tx,
            }),
        }
    }

    /// Create a pending promise together with the handle that settles it
    pub fn deferred() -> (Promise, PromiseResolver) {
        let promise = Promise::pending();
        let resolver = PromiseResolver {
            promise: promise.clone(),
        };
        (promise, resolver)
    }

    /// Create an already-fulfilled promise
    pub fn fulfilled(value: impl Into<Val>) -> Promise {
        let promise = Promise::pending();
        promise.settle(PromiseState::Fulfilled(value.into()));
        promise
    }

    /// Create an already-rejected promise
    pub fn rejected(reason: impl Into<Val>) -> Promise {
        let promise = Promise::pending();
        promise.settle(PromiseState::Rejected(reason.into()));
        promise
    }

    /// Drive `future` on the tokio runtime and settle with its outcome
    ///
    /// The future starts running immediately, whether or not anyone observes the
    /// promise. Must be called from within a tokio runtime.
    pub fn spawn<F>(future: F) -> Promise
    where
        F: Future<Output = Result<Val, Val>> + Send + 'static,
    {
        let (promise, resolver) = Promise::deferred();
        tokio::spawn(async move {
            resolver.settle(future.await);
        });
        promise
    }

    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PromiseState {
        self.inner.slot.lock().state.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.slot.lock().state.is_settled()
    }

    /// Attach a continuation that runs once, when the promise settles
    ///
    /// If the promise has already settled the continuation runs immediately on the
    /// calling thread.
    pub fn on_settle<F>(&self, continuation: F)
    where
        F: FnOnce(&PromiseState) + Send + 'static,
    {
        let mut slot = self.inner.slot.lock();
        if slot.state.is_settled() {
            let state = slot.state.clone();
            drop(slot);
            continuation(&state);
        } else {
            slot.continuations.push(Box::new(continuation));
        }
    }

    /// Wait until the promise settles and return its final state
    pub async fn settled(&self) -> PromiseState {
        let mut rx = self.inner.settled_tx.subscribe();
        // The sender lives in `inner`, which we hold, so the channel cannot close.
        let _ = rx.wait_for(|done| *done).await;
        self.state()
    }

    #[cfg(test)]
    pub(crate) fn continuation_count(&self) -> usize {
        self.inner.slot.lock().continuations.len()
    }

    /// Settle the promise. Returns false if it had already settled.
    fn settle(&self, state: PromiseState) -> bool {
        if !state.is_settled() {
            return false;
        }

        let continuations = {
            let mut slot = self.inner.slot.lock();
            if slot.state.is_settled() {
                return false;
            }
            slot.state = state.clone();
            std::mem::take(&mut slot.continuations)
        };

        for continuation in continuations {
            continuation(&state);
        }

        self.inner.settled_tx.send_replace(true);
        true
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Promise {}

impl Hash for Promise {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/* ===================== Resolver ===================== */

/// Settles the promise it was created with. Later settle calls are ignored.
#[derive(Clone)]
pub struct PromiseResolver {
    promise: Promise,
}

impl PromiseResolver {
    pub fn fulfill(&self, value: impl Into<Val>) -> bool {
        self.promise.settle(PromiseState::Fulfilled(value.into()))
    }

    pub fn reject(&self, reason: impl Into<Val>) -> bool {
        self.promise.settle(PromiseState::Rejected(reason.into()))
    }

    pub fn settle(&self, outcome: Result<Val, Val>) -> bool {
        self.promise.settle(outcome.into())
    }

    pub fn promise(&self) -> &Promise {
        &self.promise
    }
}
