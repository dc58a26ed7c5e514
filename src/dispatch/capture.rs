//! Input capture for query-requiring actions
//!
//! Speech mode announces the prompt, records until the speaker pauses
//! and transcribes the utterance. Text mode reads the text field. Both
//! paths trim surrounding whitespace and keep the original case.

use std::time::Duration;

use tracing::{info, warn};

use crate::collab::speech::{Microphone, RecognitionError, Recognizer};
use crate::config::SpeechConfig;
use crate::events::AssistantEvent;
use crate::feedback::FeedbackSink;
use crate::state::InputMode;

/// Spoken when speech capture yields nothing
pub const APOLOGY: &str = "Sorry, I didn't get that.";

/// A resolved user query; empty means the user cancelled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input state frozen when a request arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSnapshot {
    pub mode: InputMode,
    /// Text field contents
    pub text: String,
    /// Wikipedia edition
    pub language: String,
}

/// Reads commands from the microphone or the text field
pub struct InputCapture {
    microphone: Box<dyn Microphone>,
    recognizer: Box<dyn Recognizer>,
    locale: String,
    pause_threshold: Duration,
    max_listen: Duration,
}

impl InputCapture {
    pub fn new(
        microphone: Box<dyn Microphone>,
        recognizer: Box<dyn Recognizer>,
        config: &SpeechConfig,
    ) -> Self {
        Self {
            microphone,
            recognizer,
            locale: config.locale.clone(),
            pause_threshold: config.pause_threshold,
            max_listen: config.max_listen,
        }
    }

    /// Capture a command in the given mode
    ///
    /// Speech failures are recovered: the user hears an apology and the
    /// empty command is returned.
    pub fn capture(
        &mut self,
        mode: InputMode,
        prompt: &str,
        text_field: &str,
        feedback: &mut FeedbackSink,
    ) -> Command {
        match mode {
            InputMode::Text => Command::new(text_field),
            InputMode::Speech => {
                feedback.speak(prompt);
                feedback.notify(AssistantEvent::ListeningStarted);

                let command = match self.listen() {
                    Ok(text) => Command::new(&text),
                    Err(e) => {
                        warn!(%e, "speech capture failed");
                        Command::empty()
                    }
                };

                feedback.notify(AssistantEvent::ListeningStopped {
                    heard: !command.is_empty(),
                });
                if command.is_empty() {
                    feedback.speak(APOLOGY);
                }
                command
            }
        }
    }

    fn listen(&mut self) -> Result<String, RecognitionError> {
        info!(pause = ?self.pause_threshold, "listening");
        let utterance = self
            .microphone
            .record(self.pause_threshold, self.max_listen)?;

        info!(duration = ?utterance.duration(), "recognizing");
        let text = self.recognizer.transcribe(&utterance, &self.locale)?;
        info!(%text, "heard");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::{Call, CallLog, Fakes};
    use crate::config::Config;
    use tokio::sync::broadcast;

    fn setup(transcript: Option<&str>) -> (InputCapture, FeedbackSink, CallLog) {
        let log = CallLog::default();
        let services = Fakes {
            transcript: transcript.map(str::to_string),
            ..Fakes::default()
        }
        .build(&log);
        let config = Config::from_lookup(|key| (key == "HOME").then(|| "/tmp".to_string())).unwrap();
        let (tx, _) = broadcast::channel(16);
        let capture = InputCapture::new(services.microphone, services.recognizer, &config.speech);
        (capture, FeedbackSink::new(services.speaker, tx), log)
    }

    #[test]
    fn test_text_mode_reads_field_without_prompt() {
        let (mut capture, mut feedback, log) = setup(Some("ignored"));
        let command = capture.capture(InputMode::Text, "What do you want to search?", "  Rust Language ", &mut feedback);
        assert_eq!(command.as_str(), "Rust Language");
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_speech_mode_prompts_then_transcribes() {
        let (mut capture, mut feedback, log) = setup(Some(" Alan Turing "));
        let command = capture.capture(InputMode::Speech, "What do you want to search?", "", &mut feedback);
        assert_eq!(command.as_str(), "Alan Turing");
        assert_eq!(
            log.calls(),
            vec![
                Call::Speak("What do you want to search?".to_string()),
                Call::Record,
                Call::Transcribe("en-IN".to_string()),
            ]
        );
    }

    #[test]
    fn test_speech_failure_apologizes() {
        let (mut capture, mut feedback, log) = setup(None);
        let command = capture.capture(InputMode::Speech, "Please provide the file path.", "", &mut feedback);
        assert!(command.is_empty());
        assert_eq!(
            log.spoken(),
            vec!["Please provide the file path.".to_string(), APOLOGY.to_string()]
        );
    }

    #[test]
    fn test_case_is_preserved_in_both_modes() {
        let (mut capture, mut feedback, _) = setup(Some("/Home/Notes.txt"));
        let spoken = capture.capture(InputMode::Speech, "p", "", &mut feedback);
        let typed = capture.capture(InputMode::Text, "p", "/Home/Notes.txt", &mut feedback);
        assert_eq!(spoken, typed);
    }
}
