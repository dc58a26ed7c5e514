//! Feedback sink: spoken output and popups
//!
//! Popups are published as events for front-ends to render. Speech
//! output failures are logged and swallowed so they never interrupt the
//! workflow.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::collab::voice::Speaker;
use crate::dispatch::ActionResult;
use crate::events::AssistantEvent;

/// Spoken in place of an error message when an error is read aloud
pub const ERROR_PHRASE: &str = "Sorry, something went wrong.";

/// Delivers results to the user
pub struct FeedbackSink {
    speaker: Box<dyn Speaker>,
    event_tx: broadcast::Sender<AssistantEvent>,
}

impl FeedbackSink {
    pub fn new(speaker: Box<dyn Speaker>, event_tx: broadcast::Sender<AssistantEvent>) -> Self {
        Self { speaker, event_tx }
    }

    /// Read text aloud, blocking until the engine is done
    pub fn speak(&mut self, text: &str) {
        self.emit(AssistantEvent::Speaking {
            text: text.to_string(),
        });
        if let Err(e) = self.speaker.speak(text) {
            warn!(%e, "speech output failed");
        }
    }

    /// Show a popup, optionally reading the content first
    pub fn present(&mut self, title: &str, content: &str, also_speak: bool) {
        if also_speak {
            self.speak(content);
        }
        info!(%title, chars = content.len(), "presenting popup");
        self.emit(AssistantEvent::Popup {
            title: title.to_string(),
            content: content.to_string(),
        });
    }

    /// Show a normalized action result
    pub fn present_result(&mut self, result: &ActionResult, also_speak: bool) {
        match result {
            ActionResult::Text { title, content } => self.present(title, content, also_speak),
            ActionResult::Error { title, message } => {
                if also_speak {
                    self.speak(ERROR_PHRASE);
                }
                self.present(title, message, false);
            }
        }
    }

    /// Publish a progress event
    pub fn notify(&self, event: AssistantEvent) {
        self.emit(event);
    }

    fn emit(&self, event: AssistantEvent) {
        debug!(%event, "emitting event");
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
