//! Recording collaborators for tests

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use super::launcher::{LaunchError, Launcher};
use super::mail::{MailError, MailTransport};
use super::news::{Article, NewsError, NewsProvider};
use super::power::{PowerControl, PowerError};
use super::speech::{Microphone, RecognitionError, Recognizer, Utterance};
use super::voice::{SpeechOutputError, Speaker};
use super::wiki::{PageSummary, SummaryError};
use super::Services;

/// A collaborator call, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Record,
    Transcribe(String),
    Speak(String),
    Summarize { query: String, language: String },
    Headlines,
    OpenUrl(String),
    Exists(String),
    OpenFile(String),
    SendMail(String),
    Shutdown,
    Restart,
}

/// Shared call log
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    /// Calls other than speech output
    pub fn collaborator_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Speak(_)))
            .collect()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Speak(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

/// How the fake page-summary provider answers
#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    Text(String),
    NotFound,
    Disambiguation(Vec<String>),
    Panic,
}

/// Knobs for the fake collaborators
#[derive(Debug, Clone)]
pub struct Fakes {
    /// `None` makes transcription fail
    pub transcript: Option<String>,
    pub speaker_fails: bool,
    pub summary: SummaryOutcome,
    /// `None` makes the news request fail with HTTP 500
    pub articles: Option<Vec<Article>>,
    pub existing_files: Vec<String>,
    pub mail_fails: bool,
    /// When set, summaries wait for a message on this channel first
    pub summary_gate: Option<Arc<Mutex<mpsc::Receiver<()>>>>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            transcript: Some("rust".to_string()),
            speaker_fails: false,
            summary: SummaryOutcome::Text("Rust is a language.".to_string()),
            articles: Some(Vec::new()),
            existing_files: Vec::new(),
            mail_fails: false,
            summary_gate: None,
        }
    }
}

impl Fakes {
    pub fn build(self, log: &CallLog) -> Services {
        Services {
            microphone: Box::new(FakeMicrophone { log: log.clone() }),
            recognizer: Box::new(FakeRecognizer {
                log: log.clone(),
                transcript: self.transcript,
            }),
            speaker: Box::new(FakeSpeaker {
                log: log.clone(),
                fails: self.speaker_fails,
            }),
            summaries: Box::new(FakeSummaries {
                log: log.clone(),
                outcome: self.summary,
                gate: self.summary_gate,
            }),
            news: Box::new(FakeNews {
                log: log.clone(),
                articles: self.articles,
            }),
            launcher: Box::new(FakeLauncher {
                log: log.clone(),
                existing: self.existing_files,
            }),
            mailer: Box::new(FakeMailer {
                log: log.clone(),
                fails: self.mail_fails,
            }),
            power: Box::new(FakePower { log: log.clone() }),
        }
    }
}

struct FakeMicrophone {
    log: CallLog,
}

impl Microphone for FakeMicrophone {
    fn record(&mut self, _: Duration, _: Duration) -> Result<Utterance, RecognitionError> {
        self.log.push(Call::Record);
        Ok(Utterance {
            samples: vec![0.0; 160],
            sample_rate: 16_000,
        })
    }
}

struct FakeRecognizer {
    log: CallLog,
    transcript: Option<String>,
}

impl Recognizer for FakeRecognizer {
    fn transcribe(&self, _: &Utterance, locale: &str) -> Result<String, RecognitionError> {
        self.log.push(Call::Transcribe(locale.to_string()));
        self.transcript.clone().ok_or(RecognitionError::Unintelligible)
    }
}

struct FakeSpeaker {
    log: CallLog,
    fails: bool,
}

impl Speaker for FakeSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechOutputError> {
        self.log.push(Call::Speak(text.to_string()));
        if self.fails {
            Err(SpeechOutputError::Empty)
        } else {
            Ok(())
        }
    }
}

struct FakeSummaries {
    log: CallLog,
    outcome: SummaryOutcome,
    gate: Option<Arc<Mutex<mpsc::Receiver<()>>>>,
}

impl PageSummary for FakeSummaries {
    fn summarize(&self, query: &str, _: usize, language: &str) -> Result<String, SummaryError> {
        self.log.push(Call::Summarize {
            query: query.to_string(),
            language: language.to_string(),
        });
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        match &self.outcome {
            SummaryOutcome::Text(text) => Ok(text.clone()),
            SummaryOutcome::NotFound => Err(SummaryError::NotFound),
            SummaryOutcome::Disambiguation(options) => {
                Err(SummaryError::Disambiguation(options.clone()))
            }
            SummaryOutcome::Panic => panic!("summary provider exploded"),
        }
    }
}

struct FakeNews {
    log: CallLog,
    articles: Option<Vec<Article>>,
}

impl NewsProvider for FakeNews {
    fn top_headlines(&self, _: &str, _: &str) -> Result<Vec<Article>, NewsError> {
        self.log.push(Call::Headlines);
        self.articles.clone().ok_or(NewsError::Http(500))
    }
}

struct FakeLauncher {
    log: CallLog,
    existing: Vec<String>,
}

impl Launcher for FakeLauncher {
    fn open_url(&mut self, url: &str) -> Result<(), LaunchError> {
        self.log.push(Call::OpenUrl(url.to_string()));
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.log.push(Call::Exists(path.to_string()));
        self.existing.iter().any(|p| p == path)
    }

    fn open_file(&mut self, path: &str) -> Result<(), LaunchError> {
        self.log.push(Call::OpenFile(path.to_string()));
        Ok(())
    }
}

struct FakeMailer {
    log: CallLog,
    fails: bool,
}

impl MailTransport for FakeMailer {
    fn send_mail(&mut self, to: &str, _: &str, _: &str) -> Result<(), MailError> {
        self.log.push(Call::SendMail(to.to_string()));
        if self.fails {
            Err(MailError::Auth("535 authentication failed".to_string()))
        } else {
            Ok(())
        }
    }
}

struct FakePower {
    log: CallLog,
}

impl PowerControl for FakePower {
    fn shutdown_host(&mut self) -> Result<(), PowerError> {
        self.log.push(Call::Shutdown);
        Ok(())
    }

    fn restart_host(&mut self) -> Result<(), PowerError> {
        self.log.push(Call::Restart);
        Ok(())
    }
}
