//! Render session options

use serde::{Deserialize, Serialize};

/// Tunables for one render session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Fail with `PassLimitExceeded` instead of starting pass `max_passes + 1`
    pub max_passes: Option<usize>,

    /// Stay open after settling and render again whenever a rerender is requested,
    /// until the consumer drops the stream
    pub watch: bool,
}

impl RenderOptions {
    pub fn max_passes(mut self, limit: usize) -> Self {
        self.max_passes = Some(limit);
        self
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }
}
