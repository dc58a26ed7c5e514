//! Input mode state machine
//!
//! Two states, Speech and Text, with a single toggle control. The mode
//! drives the toggle label shown by front-ends.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::AssistantEvent;

/// Where query-requiring actions pull their command from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Microphone capture followed by transcription
    Speech,
    /// Contents of the front-end text field
    Text,
}

impl InputMode {
    /// Label for the toggle button
    pub fn label(self) -> &'static str {
        match self {
            InputMode::Speech => "Speech Input",
            InputMode::Text => "Text Input",
        }
    }

    /// The other mode
    pub fn flipped(self) -> Self {
        match self {
            InputMode::Speech => InputMode::Text,
            InputMode::Text => InputMode::Speech,
        }
    }
}

impl Default for InputMode {
    fn default() -> Self {
        Self::Speech
    }
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::Speech => write!(f, "Speech"),
            InputMode::Text => write!(f, "Text"),
        }
    }
}

/// Holds the current input mode and announces changes
pub struct ModeState {
    /// Current mode
    mode: InputMode,
    /// Channel for emitting mode change events
    event_tx: broadcast::Sender<AssistantEvent>,
}

impl ModeState {
    /// Create a new mode state, starting in Speech mode
    pub fn new(event_tx: broadcast::Sender<AssistantEvent>) -> Self {
        Self {
            mode: InputMode::default(),
            event_tx,
        }
    }

    /// Get the current mode
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Flip between Speech and Text
    pub fn toggle(&mut self) -> InputMode {
        let next = self.mode.flipped();
        self.transition_to(next);
        next
    }

    /// Select a mode explicitly
    ///
    /// Selecting the mode that is already active is a no-op, so repeated
    /// identical input never flips the state.
    pub fn select(&mut self, mode: InputMode) -> InputMode {
        if mode != self.mode {
            self.transition_to(mode);
        } else {
            debug!(%mode, "mode already selected");
        }
        self.mode
    }

    fn transition_to(&mut self, mode: InputMode) {
        info!(from = %self.mode, to = %mode, "input mode transition");
        self.mode = mode;
        let _ = self.event_tx.send(AssistantEvent::ModeChanged {
            mode,
            label: mode.label().to_string(),
        });
    }
}
