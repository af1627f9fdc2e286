pub mod cli;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod logging;
pub mod node;
pub mod promise;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod suspense;
pub mod value;

// Re-export main types
pub use context::{current_context, current_payload, is_rendering, run_in_context, RenderContext};
pub use error::{RenderError, Result};
pub use node::{Component, Node};
pub use promise::{Promise, PromiseId, PromiseResolver, PromiseState};
pub use value::Val;

// Re-export the render API for convenience
pub use render::{render, render_to_completion, RenderOptions, RenderSession, Snapshot};
pub use suspense::{peek_promise, request_rerender, use_promise, use_resource};
