//! Render context scope
//!
//! Exactly one `RenderContext` can be active per task. It is installed with
//! [`run_in_context`] (or [`run_in_context_sync`]) and read from any call depth
//! with [`current_context`], so components never have to thread it through
//! their arguments.
//!
//! The context lives in a tokio task-local. It is only visible while the scoped
//! future is being polled and is gone on every exit path: completion, an error
//! result, a panic, or the future being dropped. Work moved to another task with
//! `tokio::spawn` does not inherit it.
//!
//! Installing a context while one is already active is a programming error and
//! fails with [`RenderError::NestedContext`] instead of shadowing the outer one.

use std::any::{type_name, Any};
use std::future::Future;
use std::sync::Arc;

use crate::error::{Capability, RenderError, Result};
use crate::suspense::{PromiseStateStore, PromiseTracker, RerenderSignal};

tokio::task_local! {
    static ACTIVE_CONTEXT: RenderContext;
}

/* ===================== Capabilities ===================== */

/// Engine-owned handles a render session attaches to its context
#[derive(Clone, Default)]
pub struct SessionCapabilities {
    pub store: Option<PromiseStateStore>,
    pub tracker: Option<PromiseTracker>,
    pub rerender: Option<RerenderSignal>,
}

impl SessionCapabilities {
    /// Full set of fresh capabilities for a new session
    pub fn for_session() -> Self {
        Self {
            store: Some(PromiseStateStore::new()),
            tracker: Some(PromiseTracker::new()),
            rerender: Some(RerenderSignal::new()),
        }
    }
}

/* ===================== Render Context ===================== */

/// The caller's payload plus the session capabilities
#[derive(Clone)]
pub struct RenderContext {
    payload: Arc<dyn Any + Send + Sync>,
    capabilities: SessionCapabilities,
}

impl RenderContext {
    /// Context carrying `payload` and no capabilities
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self::from_arc(Arc::new(payload))
    }

    /// Context sharing an existing payload allocation
    pub fn from_arc(payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            payload,
            capabilities: SessionCapabilities::default(),
        }
    }

    /// Context with a unit payload
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn with_capabilities(mut self, capabilities: SessionCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn payload(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.payload
    }

    /// Downcast the payload to a concrete type
    pub fn payload_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.payload.clone().downcast::<T>().ok()
    }

    pub fn capabilities(&self) -> &SessionCapabilities {
        &self.capabilities
    }

    pub fn store(&self) -> Result<&PromiseStateStore> {
        self.capabilities
            .store
            .as_ref()
            .ok_or(RenderError::MissingSuspenseContext {
                capability: Capability::PromiseStore,
            })
    }

    pub fn tracker(&self) -> Option<&PromiseTracker> {
        self.capabilities.tracker.as_ref()
    }

    pub fn rerender_signal(&self) -> Result<&RerenderSignal> {
        self.capabilities
            .rerender
            .as_ref()
            .ok_or(RenderError::MissingSuspenseContext {
                capability: Capability::RerenderSignal,
            })
    }
}

/* ===================== Scope ===================== */

/// Whether a render context is active in the current task
pub fn is_rendering() -> bool {
    ACTIVE_CONTEXT.try_with(|_| ()).is_ok()
}

/// Return the active render context
pub fn current_context() -> Result<RenderContext> {
    ACTIVE_CONTEXT
        .try_with(RenderContext::clone)
        .map_err(|_| RenderError::NotRendering)
}

/// Return the active context's payload as `T`
pub fn current_payload<T: Any + Send + Sync>() -> Result<Arc<T>> {
    current_context()?
        .payload_as::<T>()
        .ok_or(RenderError::PayloadMismatch {
            expected: type_name::<T>(),
        })
}

/// Run `future` with `ctx` installed as the active context
///
/// Fails with `NestedContext` without polling `future` if a context is already
/// active in this task.
pub async fn run_in_context<F>(ctx: RenderContext, future: F) -> Result<F::Output>
where
    F: Future,
{
    if is_rendering() {
        return Err(RenderError::NestedContext);
    }
    Ok(ACTIVE_CONTEXT.scope(ctx, future).await)
}

/// Run `f` with `ctx` installed as the active context
pub fn run_in_context_sync<R, F>(ctx: RenderContext, f: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    if is_rendering() {
        return Err(RenderError::NestedContext);
    }
    Ok(ACTIVE_CONTEXT.sync_scope(ctx, f))
}
