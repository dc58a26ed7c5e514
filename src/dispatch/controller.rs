//! Dispatch workflow controller
//!
//! One entry point per trigger: capture a command if the action needs
//! one, call the bound collaborator behind a failure boundary and hand
//! the normalized result to the feedback sink.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::actions::{ActionDescriptor, Handler};
use crate::collab::launcher::{LaunchError, Launcher};
use crate::collab::mail::MailTransport;
use crate::collab::news::{format_headlines, NewsError, NewsProvider};
use crate::collab::power::{PowerControl, PowerError};
use crate::collab::wiki::{PageSummary, SummaryError};
use crate::collab::Services;
use crate::config::{resolve_secret, Config};
use crate::events::AssistantEvent;
use crate::feedback::FeedbackSink;

use super::capture::{Command, InputCapture, InputSnapshot};
use super::outcome::{ActionResult, Outcome, PowerOp};

pub const EMAIL_SENT: &str = "Email sent successfully!";
pub const EMAIL_FAILED: &str = "Sorry, I am unable to send the email at the moment.";

/// Failures raised by action handlers
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    News(#[from] NewsError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Dispatcher settings taken from [`Config`]
pub struct DispatchSettings {
    pub wiki_sentences: usize,
    pub news_country: String,
    pub news_api_key_ref: String,
    pub allow_power_control: bool,
    /// Resolves `*_ref` options to secrets
    pub secrets: fn(&str) -> Option<String>,
}

impl From<&Config> for DispatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            wiki_sentences: config.wiki.sentences,
            news_country: config.news.country.clone(),
            news_api_key_ref: config.news.api_key_ref.clone(),
            allow_power_control: config.allow_power_control,
            secrets: resolve_secret,
        }
    }
}

/// Runs actions against the collaborators
pub struct Dispatcher {
    capture: InputCapture,
    feedback: FeedbackSink,
    summaries: Box<dyn PageSummary>,
    news: Box<dyn NewsProvider>,
    launcher: Box<dyn Launcher>,
    mailer: Box<dyn MailTransport>,
    power: Box<dyn PowerControl>,
    settings: DispatchSettings,
    /// Set once Exit ran; later requests are ignored
    terminated: bool,
}

impl Dispatcher {
    pub fn new(
        services: Services,
        config: &Config,
        event_tx: broadcast::Sender<AssistantEvent>,
    ) -> Self {
        Self::with_settings(services, config, DispatchSettings::from(config), event_tx)
    }

    pub fn with_settings(
        services: Services,
        config: &Config,
        settings: DispatchSettings,
        event_tx: broadcast::Sender<AssistantEvent>,
    ) -> Self {
        Self {
            capture: InputCapture::new(services.microphone, services.recognizer, &config.speech),
            feedback: FeedbackSink::new(services.speaker, event_tx),
            summaries: services.summaries,
            news: services.news,
            launcher: services.launcher,
            mailer: services.mailer,
            power: services.power,
            settings,
            terminated: false,
        }
    }

    /// Whether Exit has been dispatched
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Run one menu action
    pub fn dispatch(&mut self, action: &ActionDescriptor, input: &InputSnapshot) -> Outcome {
        if self.terminated {
            debug!(action = %action.id, "ignoring action after exit");
            return Outcome::Ignored;
        }

        info!(action = %action.id, mode = %input.mode, "dispatching action");

        if action.handler == Handler::Terminate {
            self.terminated = true;
            self.feedback.notify(AssistantEvent::Exiting);
            return Outcome::Exiting;
        }

        self.feedback
            .notify(AssistantEvent::ActionStarted { action: action.id });

        let command = match action.prompt {
            Some(prompt) => {
                let command = self
                    .capture
                    .capture(input.mode, prompt, &input.text, &mut self.feedback);
                if command.is_empty() {
                    info!(action = %action.id, "empty command, action cancelled");
                    return Outcome::Cancelled;
                }
                command
            }
            None => Command::empty(),
        };

        let result = self.run_guarded(action, &command, &input.language);

        if let Some(result) = &result {
            let speak = action.speak_result && !result.is_error();
            if let Some(intro) = action.intro.filter(|_| speak) {
                self.feedback.speak(intro);
            }
            self.feedback.present_result(result, speak);
        }

        Outcome::Completed { result }
    }

    /// Send a mail and report the outcome aloud and in a popup
    pub fn send_email(&mut self, to: &str, subject: &str, body: &str) -> Outcome {
        if self.terminated {
            return Outcome::Ignored;
        }

        let result = match self.mailer.send_mail(to, subject, body) {
            Ok(()) => {
                info!(%to, "email sent");
                ActionResult::Text {
                    title: "Email".to_string(),
                    content: EMAIL_SENT.to_string(),
                }
            }
            Err(e) => {
                warn!(%e, %to, "email failed");
                ActionResult::Error {
                    title: "Email Error".to_string(),
                    message: EMAIL_FAILED.to_string(),
                }
            }
        };

        match &result {
            ActionResult::Text { title, content } => self.feedback.present(title, content, true),
            ActionResult::Error { title, message } => {
                self.feedback.speak(message);
                self.feedback.present(title, message, false);
            }
        }

        Outcome::Completed {
            result: Some(result),
        }
    }

    /// Shut down or restart the host when allowed by configuration
    pub fn power(&mut self, op: PowerOp) -> Outcome {
        if self.terminated {
            return Outcome::Ignored;
        }

        let outcome = if !self.settings.allow_power_control {
            Err(PowerError::Disabled)
        } else {
            match op {
                PowerOp::Shutdown => self.power.shutdown_host(),
                PowerOp::Restart => self.power.restart_host(),
            }
        };

        let result = match outcome {
            Ok(()) => None,
            Err(e) => {
                warn!(%e, ?op, "power operation failed");
                Some(ActionResult::Error {
                    title: "Error".to_string(),
                    message: e.to_string(),
                })
            }
        };

        if let Some(result) = &result {
            self.feedback.present_result(result, false);
        }
        Outcome::Completed { result }
    }

    /// Call the handler, turning errors and panics into error results
    fn run_guarded(
        &mut self,
        action: &ActionDescriptor,
        command: &Command,
        language: &str,
    ) -> Option<ActionResult> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_handler(action.handler, command, language)
        }));

        match outcome {
            Ok(Ok(Some(content))) => Some(ActionResult::Text {
                title: action.result_title.unwrap_or(action.label).to_string(),
                content,
            }),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(action = %action.id, error = %e, "action failed");
                Some(ActionResult::Error {
                    title: action.error_title.to_string(),
                    message: e.to_string(),
                })
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(action = %action.id, %message, "action handler panicked");
                Some(ActionResult::Error {
                    title: action.error_title.to_string(),
                    message,
                })
            }
        }
    }

    fn run_handler(
        &mut self,
        handler: Handler,
        command: &Command,
        language: &str,
    ) -> Result<Option<String>, ActionError> {
        match handler {
            Handler::Summarize => {
                let summary =
                    self.summaries
                        .summarize(command.as_str(), self.settings.wiki_sentences, language)?;
                Ok(Some(summary))
            }
            Handler::OpenUrl(url) => {
                self.launcher.open_url(url)?;
                Ok(None)
            }
            Handler::Headlines => {
                let key_ref = &self.settings.news_api_key_ref;
                let api_key = (self.settings.secrets)(key_ref)
                    .ok_or_else(|| NewsError::MissingApiKey(key_ref.clone()))?;
                let articles = self
                    .news
                    .top_headlines(&api_key, &self.settings.news_country)?;
                Ok(Some(format_headlines(&articles)))
            }
            Handler::OpenFile => {
                let path = command.as_str();
                if !self.launcher.exists(path) {
                    return Err(LaunchError::NotFound.into());
                }
                self.launcher.open_file(path)?;
                Ok(None)
            }
            // Handled before capture
            Handler::Terminate => Ok(None),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{lookup, registry, ActionId};
    use crate::collab::fakes::{Call, CallLog, Fakes, SummaryOutcome};
    use crate::collab::news::Article;
    use crate::state::InputMode;

    fn test_config() -> Config {
        Config::from_lookup(|key| (key == "HOME").then(|| "/tmp".to_string())).unwrap()
    }

    fn test_secret(_: &str) -> Option<String> {
        Some("test-key".to_string())
    }

    fn dispatcher(fakes: Fakes) -> (Dispatcher, CallLog, broadcast::Receiver<AssistantEvent>) {
        dispatcher_with(fakes, false)
    }

    fn dispatcher_with(
        fakes: Fakes,
        allow_power_control: bool,
    ) -> (Dispatcher, CallLog, broadcast::Receiver<AssistantEvent>) {
        let log = CallLog::default();
        let config = test_config();
        let settings = DispatchSettings {
            allow_power_control,
            secrets: test_secret,
            ..DispatchSettings::from(&config)
        };
        let (tx, rx) = broadcast::channel(64);
        let dispatcher = Dispatcher::with_settings(fakes.build(&log), &config, settings, tx);
        (dispatcher, log, rx)
    }

    fn text_input(text: &str) -> InputSnapshot {
        InputSnapshot {
            mode: InputMode::Text,
            text: text.to_string(),
            language: "en".to_string(),
        }
    }

    fn speech_input() -> InputSnapshot {
        InputSnapshot {
            mode: InputMode::Speech,
            text: String::new(),
            language: "en".to_string(),
        }
    }

    fn popups(rx: &mut broadcast::Receiver<AssistantEvent>) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AssistantEvent::Popup { title, content } = event {
                out.push((title, content));
            }
        }
        out
    }

    #[test]
    fn test_wiki_not_found_single_popup() {
        let (mut d, log, mut rx) = dispatcher(Fakes {
            summary: SummaryOutcome::NotFound,
            ..Fakes::default()
        });

        d.dispatch(lookup(ActionId::SearchWikipedia), &text_input("zzqx123"));

        assert_eq!(
            popups(&mut rx),
            vec![("Wikipedia Error".to_string(), "Page not found.".to_string())]
        );
        assert_eq!(
            log.collaborator_calls(),
            vec![Call::Summarize {
                query: "zzqx123".to_string(),
                language: "en".to_string()
            }]
        );
        // Errors are not read aloud
        assert!(log.spoken().is_empty());
    }

    #[test]
    fn test_wiki_success_is_spoken_then_shown() {
        let (mut d, log, mut rx) = dispatcher(Fakes::default());

        let outcome = d.dispatch(lookup(ActionId::SearchWikipedia), &text_input("rust"));

        assert_eq!(
            log.spoken(),
            vec![
                "According to Wikipedia".to_string(),
                "Rust is a language.".to_string()
            ]
        );
        assert_eq!(
            popups(&mut rx),
            vec![(
                "Wikipedia Results".to_string(),
                "Rust is a language.".to_string()
            )]
        );
        assert!(matches!(outcome, Outcome::Completed { result: Some(ActionResult::Text { .. }) }));
    }

    #[test]
    fn test_wiki_disambiguation() {
        let (mut d, _, mut rx) = dispatcher(Fakes {
            summary: SummaryOutcome::Disambiguation(vec!["Mercury (planet)".to_string()]),
            ..Fakes::default()
        });

        d.dispatch(lookup(ActionId::SearchWikipedia), &text_input("mercury"));

        assert_eq!(
            popups(&mut rx),
            vec![(
                "Wikipedia Error".to_string(),
                "Disambiguation error: Mercury (planet)".to_string()
            )]
        );
    }

    #[test]
    fn test_empty_speech_cancels_silently() {
        let (mut d, log, mut rx) = dispatcher(Fakes {
            transcript: None,
            ..Fakes::default()
        });

        let outcome = d.dispatch(lookup(ActionId::SearchWikipedia), &speech_input());

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(popups(&mut rx).is_empty());
        assert!(!log
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Summarize { .. })));
    }

    #[test]
    fn test_empty_text_cancels_silently() {
        let (mut d, log, mut rx) = dispatcher(Fakes::default());

        let outcome = d.dispatch(lookup(ActionId::OpenFile), &text_input("   "));

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(popups(&mut rx).is_empty());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_news_lists_articles_in_order() {
        let (mut d, _, mut rx) = dispatcher(Fakes {
            articles: Some(vec![
                Article {
                    title: "A".to_string(),
                    description: Some("d1".to_string()),
                    url: "u1".to_string(),
                },
                Article {
                    title: "B".to_string(),
                    description: Some("d2".to_string()),
                    url: "u2".to_string(),
                },
            ]),
            ..Fakes::default()
        });

        d.dispatch(lookup(ActionId::FetchNews), &speech_input());

        let shown = popups(&mut rx);
        assert_eq!(shown.len(), 1);
        let (title, content) = &shown[0];
        assert_eq!(title, "Latest News");
        let a = content.find("1. A\n   d1\n   Read more: u1").unwrap();
        let b = content.find("2. B\n   d2\n   Read more: u2").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_news_http_failure() {
        let (mut d, _, mut rx) = dispatcher(Fakes {
            articles: None,
            ..Fakes::default()
        });

        d.dispatch(lookup(ActionId::FetchNews), &speech_input());

        assert_eq!(
            popups(&mut rx),
            vec![("Latest News".to_string(), "Failed to fetch news.".to_string())]
        );
    }

    #[test]
    fn test_news_without_key() {
        let log = CallLog::default();
        let config = test_config();
        let settings = DispatchSettings {
            secrets: |_| None,
            ..DispatchSettings::from(&config)
        };
        let (tx, mut rx) = broadcast::channel(16);
        let mut d = Dispatcher::with_settings(Fakes::default().build(&log), &config, settings, tx);

        d.dispatch(lookup(ActionId::FetchNews), &speech_input());

        assert!(log.collaborator_calls().is_empty());
        let shown = popups(&mut rx);
        assert_eq!(shown.len(), 1);
        assert!(shown[0].1.contains("DESKMATE_NEWS_API_KEY"));
    }

    #[test]
    fn test_missing_file_never_opened() {
        let (mut d, log, mut rx) = dispatcher(Fakes::default());

        d.dispatch(lookup(ActionId::OpenFile), &text_input("/no/such/file"));

        assert_eq!(
            popups(&mut rx),
            vec![("Error".to_string(), "File not found.".to_string())]
        );
        assert_eq!(
            log.collaborator_calls(),
            vec![Call::Exists("/no/such/file".to_string())]
        );
    }

    #[test]
    fn test_existing_file_opened_without_popup() {
        let (mut d, log, mut rx) = dispatcher(Fakes {
            existing_files: vec!["/home/me/Notes.txt".to_string()],
            ..Fakes::default()
        });

        let outcome = d.dispatch(lookup(ActionId::OpenFile), &text_input("/home/me/Notes.txt"));

        assert_eq!(outcome, Outcome::Completed { result: None });
        assert!(popups(&mut rx).is_empty());
        assert!(log
            .calls()
            .contains(&Call::OpenFile("/home/me/Notes.txt".to_string())));
    }

    #[test]
    fn test_open_websites() {
        let (mut d, log, _) = dispatcher(Fakes::default());

        d.dispatch(lookup(ActionId::OpenYoutube), &speech_input());
        d.dispatch(lookup(ActionId::OpenGoogle), &speech_input());

        // Constant URLs never ask for input
        assert_eq!(
            log.calls(),
            vec![
                Call::OpenUrl("https://www.youtube.com".to_string()),
                Call::OpenUrl("https://www.google.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_panic_becomes_error_result() {
        let (mut d, _, mut rx) = dispatcher(Fakes {
            summary: SummaryOutcome::Panic,
            ..Fakes::default()
        });

        let outcome = d.dispatch(lookup(ActionId::SearchWikipedia), &text_input("boom"));

        assert!(matches!(outcome, Outcome::Completed { result: Some(ActionResult::Error { .. }) }));
        assert_eq!(
            popups(&mut rx),
            vec![(
                "Wikipedia Error".to_string(),
                "summary provider exploded".to_string()
            )]
        );

        // The dispatcher is still usable afterwards
        d.dispatch(lookup(ActionId::OpenGoogle), &speech_input());
        assert!(!d.is_terminated());
    }

    #[test]
    fn test_every_action_leaves_dispatcher_usable() {
        let (mut d, log, _) = dispatcher(Fakes::default());

        for action in registry().iter().filter(|a| a.id != ActionId::Exit) {
            d.dispatch(action, &text_input("rust"));
        }
        for action in registry().iter().filter(|a| a.id != ActionId::Exit) {
            d.dispatch(action, &speech_input());
        }

        let summaries = log
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::Summarize { .. }))
            .count();
        assert_eq!(summaries, 2);
        assert!(!d.is_terminated());
    }

    #[test]
    fn test_exit_stops_everything() {
        let (mut d, log, mut rx) = dispatcher(Fakes::default());

        assert_eq!(d.dispatch(lookup(ActionId::Exit), &speech_input()), Outcome::Exiting);
        assert!(d.is_terminated());
        assert!(matches!(rx.try_recv(), Ok(AssistantEvent::Exiting)));

        for action in registry() {
            assert_eq!(d.dispatch(action, &text_input("rust")), Outcome::Ignored);
        }
        assert_eq!(d.send_email("a@example.org", "s", "b"), Outcome::Ignored);
        assert_eq!(d.power(PowerOp::Restart), Outcome::Ignored);

        assert!(log.calls().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_language_is_forwarded() {
        let (mut d, log, _) = dispatcher(Fakes::default());
        let input = InputSnapshot {
            language: "fr".to_string(),
            ..text_input("Paris")
        };

        d.dispatch(lookup(ActionId::SearchWikipedia), &input);

        assert!(log.calls().contains(&Call::Summarize {
            query: "Paris".to_string(),
            language: "fr".to_string()
        }));
    }

    #[test]
    fn test_send_email_success() {
        let (mut d, log, mut rx) = dispatcher(Fakes::default());

        d.send_email("friend@example.org", "Hello", "Hi there");

        assert_eq!(log.spoken(), vec![EMAIL_SENT.to_string()]);
        assert_eq!(popups(&mut rx), vec![("Email".to_string(), EMAIL_SENT.to_string())]);
    }

    #[test]
    fn test_send_email_failure() {
        let (mut d, log, mut rx) = dispatcher(Fakes {
            mail_fails: true,
            ..Fakes::default()
        });

        let outcome = d.send_email("friend@example.org", "Hello", "Hi there");

        assert!(matches!(outcome, Outcome::Completed { result: Some(ActionResult::Error { .. }) }));
        assert_eq!(log.spoken(), vec![EMAIL_FAILED.to_string()]);
        assert_eq!(
            popups(&mut rx),
            vec![("Email Error".to_string(), EMAIL_FAILED.to_string())]
        );
    }

    #[test]
    fn test_power_disabled_by_default() {
        let (mut d, log, mut rx) = dispatcher(Fakes::default());

        d.power(PowerOp::Shutdown);

        assert!(log.calls().is_empty());
        assert_eq!(
            popups(&mut rx),
            vec![("Error".to_string(), "Power control is disabled.".to_string())]
        );
    }

    #[test]
    fn test_power_when_allowed() {
        let (mut d, log, _) = dispatcher_with(Fakes::default(), true);

        d.power(PowerOp::Restart);
        d.power(PowerOp::Shutdown);

        assert_eq!(log.calls(), vec![Call::Restart, Call::Shutdown]);
    }
}
