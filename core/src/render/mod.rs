//! Render sessions
//!
//! A session owns one promise store, one tracker and one rerender signal, and
//! renders its root pass after pass until no promise is pending and no
//! rerender was requested.

pub mod options;
pub mod session;

pub use options::RenderOptions;
pub use session::{render, render_to_completion, RenderSession, SessionState, Snapshot, Step};
