//! Results of a dispatched action

use serde::{Deserialize, Serialize};

/// Normalized result of a collaborator call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionResult {
    Text { title: String, content: String },
    Error { title: String, message: String },
}

impl ActionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error { .. })
    }
}

/// What happened to a dispatch request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The captured command was empty, nothing was called
    Cancelled,
    /// The handler ran; `None` when there is nothing to show
    Completed { result: Option<ActionResult> },
    /// Exit was requested, the process is stopping
    Exiting,
    /// The assistant already exited
    Ignored,
}

/// Host power operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerOp {
    Shutdown,
    Restart,
}
