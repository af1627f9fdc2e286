//! Render-pass loop
//!
//! A session renders its root again and again until nothing is left to wait
//! for. The loop is driven by [`RenderSession::step`]; [`RenderSession::stream`]
//! repeatedly calls it and yields every snapshot.
//!
//! ## Function Organization
//! 1. stream() / render_final() - drivers (call step repeatedly)
//! 2. step() - state machine: wait for progress, run one pass, decide what's next
//! 3. run_pass() - one resolution of the root inside a fresh render context

use std::any::Any;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, debug_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::context::{run_in_context, RenderContext, SessionCapabilities};
use crate::error::{RenderError, Result};
use crate::node::Node;
use crate::promise::Promise;
use crate::resolver::resolve_value;
use crate::suspense::{PromiseStateStore, PromiseTracker, RerenderSignal};
use crate::value::{val_to_json, Val};

use super::options::RenderOptions;

/* ===================== Types ===================== */

/// One emitted render pass
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// 1-based pass number
    pub pass: usize,
    /// The whole resolved tree of this pass
    pub tree: Val,
    /// False when more passes will follow
    pub settled: bool,
}

impl Snapshot {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "pass": self.pass,
            "settled": self.settled,
            "tree": val_to_json(&self.tree),
        })
    }
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Settled,
    AwaitingProgress,
    Done,
}

/// Result of one resolution of the root
enum PassOutcome {
    Ready(Val),
    Suspended(Promise),
    Failed(RenderError),
}

/// Result of executing one step
#[derive(Debug)]
pub enum Step {
    /// A pass completed; emit its snapshot
    Emit(Snapshot),
    /// A pass suspended; nothing to emit, step again
    Continue,
    /// The session failed; no further steps
    Fail(RenderError),
    /// The session is over
    Done,
}

/* ===================== Session ===================== */

/// Owns the store, tracker and rerender signal of one render
pub struct RenderSession {
    id: Uuid,
    root: Arc<Node>,
    payload: Arc<dyn Any + Send + Sync>,
    options: RenderOptions,
    store: PromiseStateStore,
    tracker: PromiseTracker,
    signal: RerenderSignal,
    state: SessionState,
    passes: usize,
    /// Settled promise count when the last pass started; any settlement past it is progress
    settled_at_pass_start: usize,
    span: Span,
}

impl RenderSession {
    /// Create a session for `root` with a unit payload and default options
    pub fn new(root: Node) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            root: Arc::new(root),
            payload: Arc::new(()),
            options: RenderOptions::default(),
            store: PromiseStateStore::new(),
            tracker: PromiseTracker::new(),
            signal: RerenderSignal::new(),
            state: SessionState::Idle,
            passes: 0,
            settled_at_pass_start: 0,
            span: debug_span!("render_session", session = %id),
        }
    }

    /// Set the payload components can read with `current_payload`
    pub fn payload<T: Any + Send + Sync>(self, payload: T) -> Self {
        self.shared_payload(Arc::new(payload))
    }

    pub fn shared_payload(mut self, payload: Arc<dyn Any + Send + Sync>) -> Self {
        self.payload = payload;
        self
    }

    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of passes started so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn store(&self) -> PromiseStateStore {
        self.store.clone()
    }

    pub fn tracker(&self) -> PromiseTracker {
        self.tracker.clone()
    }

    /// Handle for requesting rerenders from outside the tree
    pub fn rerender_signal(&self) -> RerenderSignal {
        self.signal.clone()
    }

    /* ===================== Drivers ===================== */

    /// Render as a stream of snapshots
    ///
    /// Every completed pass is emitted, including passes whose components
    /// rendered a placeholder for a pending promise (`settled == false`). A pass
    /// that suspends is discarded and not emitted. An error is the last item.
    /// Dropping the stream closes the session's rerender signal.
    pub fn stream(self) -> impl Stream<Item = Result<Snapshot>> + Send {
        let mut session = self;
        stream! {
            let _close = CloseOnDrop(session.signal.clone());
            loop {
                let span = session.span.clone();
                match session.step().instrument(span).await {
                    Step::Emit(snapshot) => {
                        yield Ok(snapshot);
                    }
                    Step::Continue => continue,
                    Step::Fail(err) => {
                        yield Err(err);
                        break;
                    }
                    Step::Done => break,
                }
            }
        }
    }

    /// Render until settled and return the last tree
    ///
    /// Watch mode is ignored here since the session would never end.
    pub async fn render_final(mut self) -> Result<Val> {
        self.options.watch = false;
        let mut snapshots = Box::pin(self.stream());

        let mut last = None;
        while let Some(item) = snapshots.next().await {
            last = Some(item?.tree);
        }
        last.ok_or_else(|| RenderError::component("render session ended without output"))
    }

    /* ===================== State Machine ===================== */

    /// Execute one step of the session
    ///
    /// 1. Waits if the previous pass left the session waiting
    /// 2. Runs one pass
    /// 3. Decides between emitting, retrying and finishing
    pub async fn step(&mut self) -> Step {
        match self.state {
            SessionState::Done => return Step::Done,

            SessionState::Settled => {
                if !self.options.watch {
                    self.finish();
                    return Step::Done;
                }
                self.signal.requested().await;
                if self.signal.is_closed() {
                    self.finish();
                    return Step::Done;
                }
            }

            // The pass budget is checked before waiting, not after.
            SessionState::AwaitingProgress => {
                if let Some(failed) = self.check_pass_limit() {
                    return failed;
                }
                // Nothing pending means nothing will settle; retry right away.
                if self.tracker.has_pending_promises() {
                    let seen = self.settled_at_pass_start;
                    tokio::select! {
                        _ = self.tracker.wait_for_settled_beyond(seen) => {}
                        _ = self.signal.requested() => {}
                    }
                }
            }

            SessionState::Idle | SessionState::Resolving => {}
        }

        if let Some(failed) = self.check_pass_limit() {
            return failed;
        }

        self.transition(SessionState::Resolving);
        self.signal.take();
        self.settled_at_pass_start = self.tracker.settled_count();

        match self.run_pass().await {
            PassOutcome::Failed(err) => {
                debug!(pass = self.passes, error = %err, "render pass failed");
                self.finish();
                Step::Fail(err)
            }

            PassOutcome::Suspended(promise) => {
                debug!(pass = self.passes, promise = %promise.id(), "render pass suspended");
                self.tracker.track(&promise);
                self.transition(SessionState::AwaitingProgress);
                Step::Continue
            }

            PassOutcome::Ready(tree) => {
                let settled = !self.signal.is_requested() && self.tracker.are_all_resolved();
                if settled {
                    self.transition(SessionState::Settled);
                    if !self.options.watch {
                        self.finish();
                    }
                } else {
                    self.transition(SessionState::AwaitingProgress);
                }

                Step::Emit(Snapshot {
                    pass: self.passes,
                    tree,
                    settled,
                })
            }
        }
    }

    async fn run_pass(&mut self) -> PassOutcome {
        self.passes += 1;
        debug!(pass = self.passes, "starting render pass");

        let capabilities = SessionCapabilities {
            store: Some(self.store.clone()),
            tracker: Some(self.tracker.clone()),
            rerender: Some(self.signal.clone()),
        };
        let ctx = RenderContext::from_arc(self.payload.clone()).with_capabilities(capabilities);

        match run_in_context(ctx, resolve_value(&self.root)).await {
            Ok(Ok(tree)) => PassOutcome::Ready(tree),
            Ok(Err(RenderError::Suspended(promise))) => PassOutcome::Suspended(promise),
            Ok(Err(err)) | Err(err) => PassOutcome::Failed(err),
        }
    }

    fn check_pass_limit(&mut self) -> Option<Step> {
        let limit = self.options.max_passes?;
        if self.passes < limit {
            return None;
        }
        warn!(limit, "render did not settle, giving up");
        self.finish();
        Some(Step::Fail(RenderError::PassLimitExceeded { limit }))
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    fn finish(&mut self) {
        self.transition(SessionState::Done);
        self.signal.close();
    }
}

/// Closes the signal when the stream is dropped or runs out
struct CloseOnDrop(RerenderSignal);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/* ===================== Convenience ===================== */

/// Stream every snapshot of rendering `root` with `payload`
pub fn render<T: Any + Send + Sync>(
    root: Node,
    payload: T,
) -> impl Stream<Item = Result<Snapshot>> + Send {
    RenderSession::new(root).payload(payload).stream()
}

/// Render `root` with `payload` until settled and return the final tree
pub async fn render_to_completion<T: Any + Send + Sync>(root: Node, payload: T) -> Result<Val> {
    RenderSession::new(root).payload(payload).render_final().await
}
