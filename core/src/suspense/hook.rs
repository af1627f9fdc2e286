//! Suspense hooks for component authors
//!
//! All hooks read the active render context, so they only work while a render
//! pass is running in the current task.

use tracing::trace;

use crate::context::{current_context, RenderContext};
use crate::error::{Capability, RenderError, Result};
use crate::promise::{Promise, PromiseState};
use crate::value::Val;

use super::signal::RerenderSignal;

/// Return the promise's value, or suspend the current pass until it settles
///
/// - Unseen promise: recorded as pending, tracked, and `Err(Suspended)` is returned
/// - Still pending: `Err(Suspended)` again, nothing is registered twice
/// - Fulfilled: the value
/// - Rejected: `Err(RejectedDependency)` carrying the reason
///
/// Propagate the error with `?`; the render loop retries once the promise settles.
pub fn use_promise(promise: &Promise) -> Result<Val> {
    match observe(promise)? {
        PromiseState::Pending => Err(RenderError::Suspended(promise.clone())),
        PromiseState::Fulfilled(value) => Ok(value),
        PromiseState::Rejected(reason) => Err(RenderError::RejectedDependency {
            promise: promise.id(),
            reason,
        }),
    }
}

/// Like [`use_promise`], but returns `Ok(None)` instead of suspending
///
/// The pass completes with whatever placeholder the component renders, and the
/// loop renders again once the promise settles.
pub fn peek_promise(promise: &Promise) -> Result<Option<Val>> {
    match use_promise(promise) {
        Ok(value) => Ok(Some(value)),
        Err(RenderError::Suspended(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// [`use_promise`] on the session's promise for `key`, created by `make` on first use
pub fn use_resource<F>(key: &str, make: F) -> Result<Val>
where
    F: FnOnce() -> Promise,
{
    let ctx = suspense_context()?;
    let promise = ctx.store()?.promise_for(key, make);
    use_promise(&promise)
}

/// The active session's rerender signal
pub fn rerender_signal() -> Result<RerenderSignal> {
    let ctx = current_context().map_err(|_| RenderError::MissingSuspenseContext {
        capability: Capability::RerenderSignal,
    })?;
    ctx.rerender_signal().cloned()
}

/// Ask the active session for one more render pass
pub fn request_rerender() -> Result<()> {
    rerender_signal()?.request_rerender();
    Ok(())
}

fn suspense_context() -> Result<RenderContext> {
    current_context().map_err(|_| RenderError::MissingSuspenseContext {
        capability: Capability::PromiseStore,
    })
}

/// Look up the promise in the session store, registering it on first sight
fn observe(promise: &Promise) -> Result<PromiseState> {
    let ctx = suspense_context()?;
    let store = ctx.store()?;

    if let Some(state) = store.get(promise.id()) {
        return Ok(state);
    }

    store.set(promise.id(), PromiseState::Pending);
    store.record_settlement(promise);
    if let Some(tracker) = ctx.tracker() {
        tracker.track(promise);
    }
    trace!(promise = %promise.id(), "registered suspense dependency");

    Ok(PromiseState::Pending)
}
