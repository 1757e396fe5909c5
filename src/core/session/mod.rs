//! # Session Module
//!
//! Runs analyses in the background and keeps their results for polling.
//!
//! A caller creates a session, hands it to an [`AnalysisTask`], and polls
//! [`SessionStore::status`] until it reports a terminal state. Unknown ids
//! are reported as not found, which is distinct from a session that simply
//! has not started yet.

mod store;
mod task;

pub use store::{SessionId, SessionSnapshot, SessionStatus, SessionStore};
pub use task::{AnalysisTask, TaskHandle};
