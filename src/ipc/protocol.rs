//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::actions::{ActionDescriptor, ActionId};
use crate::dispatch::{Outcome, PowerOp};
use crate::events::AssistantEvent;
use crate::state::InputMode;

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current assistant status
    GetStatus,

    /// Request the menu layout
    GetMenu,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to event notifications
    Subscribe,

    /// Flip between speech and text input
    ToggleMode,

    /// Select an input mode explicitly
    SetMode { mode: InputMode },

    /// Replace the text field contents
    SetText { text: String },

    /// Select the Wikipedia edition
    SetLanguage { language: String },

    /// Press a menu button
    Trigger { action: ActionId },

    /// Send a mail through the configured transport
    SendEmail {
        to: String,
        subject: String,
        body: String,
    },

    /// Shut down or restart the host
    Power { op: PowerOp },
}

impl Request {
    /// Whether the request runs through the dispatcher
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            Request::Trigger { .. } | Request::SendEmail { .. } | Request::Power { .. }
        )
    }
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current assistant status
    Status(AssistantStatus),

    /// Menu layout
    Menu(Menu),

    /// Input mode after a toggle or selection
    ModeChange { mode: InputMode, label: String },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Request applied, nothing to report
    Ack,

    /// A dispatched action finished
    Dispatched { outcome: Outcome },

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Assistant event occurred
    Event { event: AssistantEvent },
}

/// Full assistant status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantStatus {
    /// Daemon version
    pub version: String,

    /// Current input mode
    pub mode: InputMode,

    /// Toggle button label for the current mode
    pub mode_label: String,

    /// Selected Wikipedia edition
    pub language: String,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for AssistantStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: InputMode::default(),
            mode_label: InputMode::default().label().to_string(),
            language: "en".to_string(),
            uptime_secs: 0,
        }
    }
}

/// One button of the menu grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    pub action: ActionId,
    pub label: String,
    pub requires_query: bool,
}

impl From<&ActionDescriptor> for MenuEntry {
    fn from(descriptor: &ActionDescriptor) -> Self {
        Self {
            action: descriptor.id,
            label: descriptor.label.to_string(),
            requires_query: descriptor.requires_query(),
        }
    }
}

/// Everything a front-end needs to draw the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    pub actions: Vec<MenuEntry>,
    pub languages: Vec<String>,
    pub mode_label: String,
}
