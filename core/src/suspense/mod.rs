//! # Suspense
//!
//! The "not ready yet" protocol. A component that needs an asynchronous value
//! calls [`use_promise`]. On first sight of a promise the hook records it as
//! pending in the session's [`PromiseStateStore`], registers it with the
//! [`PromiseTracker`], and returns `Err(RenderError::Suspended(promise))`.
//! The render loop catches that, waits for progress, and renders again from the
//! root. By then the store holds the settled value and the hook returns it.
//!
//! The store and tracker accumulate across passes and are dropped with the
//! session. The [`RerenderSignal`] lets components request one more pass without
//! any promise being involved.

pub mod hook;
pub mod signal;
pub mod store;
pub mod tracker;

pub use hook::{peek_promise, request_rerender, rerender_signal, use_promise, use_resource};
pub use signal::RerenderSignal;
pub use store::{create_promise_state_manager, PromiseStateStore};
pub use tracker::{create_promise_tracker, PromiseTracker};
