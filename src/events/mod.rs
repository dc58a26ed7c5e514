//! Events published to front-ends
//!
//! Mode changes, listening progress, spoken output and popups all flow
//! through a single broadcast channel and are pushed to subscribed
//! IPC clients.

use serde::{Deserialize, Serialize};

use crate::actions::ActionId;
use crate::state::InputMode;

/// Events emitted while the assistant works
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// Input mode toggled
    ModeChanged {
        mode: InputMode,
        /// Label the toggle button should show
        label: String,
    },

    /// Wikipedia edition changed
    LanguageChanged { language: String },

    /// An action was triggered
    ActionStarted { action: ActionId },

    /// Microphone capture started
    ListeningStarted,

    /// Microphone capture finished
    ListeningStopped {
        /// Whether a non-empty command was recognized
        heard: bool,
    },

    /// Text handed to the speech-output engine
    Speaking { text: String },

    /// Modal popup to render
    Popup { title: String, content: String },

    /// The assistant is terminating
    Exiting,
}

impl std::fmt::Display for AssistantEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantEvent::ModeChanged { mode, .. } => write!(f, "MODE_CHANGED ({})", mode),
            AssistantEvent::LanguageChanged { language } => {
                write!(f, "LANGUAGE_CHANGED ({})", language)
            }
            AssistantEvent::ActionStarted { action } => write!(f, "ACTION_STARTED ({})", action),
            AssistantEvent::ListeningStarted => write!(f, "LISTENING_STARTED"),
            AssistantEvent::ListeningStopped { heard } => {
                write!(f, "LISTENING_STOPPED (heard={})", heard)
            }
            AssistantEvent::Speaking { .. } => write!(f, "SPEAKING"),
            AssistantEvent::Popup { title, .. } => write!(f, "POPUP ({})", title),
            AssistantEvent::Exiting => write!(f, "EXITING"),
        }
    }
}
