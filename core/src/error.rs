//! Error types for the render engine

use std::fmt;

use thiserror::Error;

use crate::promise::{Promise, PromiseId};
use crate::value::Val;

/// Session capability a hook needs from the active context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    PromiseStore,
    PromiseTracker,
    RerenderSignal,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::PromiseStore => f.write_str("promise state store"),
            Capability::PromiseTracker => f.write_str("promise tracker"),
            Capability::RerenderSignal => f.write_str("rerender signal"),
        }
    }
}

/// Errors raised while rendering
///
/// `Suspended` is control flow rather than a failure: it carries the dependency a
/// component is waiting on and is consumed by the render loop, never handed to the
/// consumer of a session.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no render context is active")]
    NotRendering,

    #[error("a render context is already active in this task")]
    NestedContext,

    #[error("suspense hook used without a {capability} on the active render context")]
    MissingSuspenseContext { capability: Capability },

    #[error("render context payload is not a {expected}")]
    PayloadMismatch { expected: &'static str },

    #[error("render suspended on {}", .0.id())]
    Suspended(Promise),

    #[error("{promise} was rejected: {reason:?}")]
    RejectedDependency { promise: PromiseId, reason: Val },

    #[error("render did not settle within {limit} passes")]
    PassLimitExceeded { limit: usize },

    #[error(transparent)]
    Component(#[from] anyhow::Error),
}

impl RenderError {
    /// Wrap an arbitrary component failure
    pub fn component(msg: impl fmt::Display) -> Self {
        RenderError::Component(anyhow::anyhow!("{}", msg))
    }

    /// Whether this is the "not ready yet" dependency signal
    pub fn is_suspension(&self) -> bool {
        matches!(self, RenderError::Suspended(_))
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_capability_is_named() {
        let err = RenderError::MissingSuspenseContext {
            capability: Capability::PromiseStore,
        };
        assert!(err.to_string().contains("promise state store"));

        let err = RenderError::MissingSuspenseContext {
            capability: Capability::RerenderSignal,
        };
        assert!(err.to_string().contains("rerender signal"));
    }

    #[test]
    fn test_component_errors_pass_through() {
        let err: RenderError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_suspension());
    }
}
