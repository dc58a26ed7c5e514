//! External collaborators the assistant calls but does not implement
//!
//! Each concern sits behind a trait so the dispatcher can be driven by
//! real services in the daemon and by recording fakes in tests.

pub mod launcher;
pub mod mail;
#[cfg(feature = "microphone")]
mod microphone;
pub mod news;
pub mod power;
pub mod speech;
pub mod voice;
pub mod wiki;

#[cfg(test)]
pub mod fakes;

use tracing::info;

use crate::config::Config;

use self::launcher::{Launcher, SystemLauncher};
use self::mail::{MailTransport, SmtpMailer};
use self::news::{NewsApiClient, NewsProvider};
use self::power::{PowerControl, SystemPower};
use self::speech::{HttpRecognizer, Microphone, Recognizer};
use self::voice::{Speaker, SystemSpeaker};
use self::wiki::{PageSummary, WikipediaClient};

/// Every collaborator, constructed once at startup
pub struct Services {
    pub microphone: Box<dyn Microphone>,
    pub recognizer: Box<dyn Recognizer>,
    pub speaker: Box<dyn Speaker>,
    pub summaries: Box<dyn PageSummary>,
    pub news: Box<dyn NewsProvider>,
    pub launcher: Box<dyn Launcher>,
    pub mailer: Box<dyn MailTransport>,
    pub power: Box<dyn PowerControl>,
}

impl Services {
    /// Production collaborators
    pub fn from_config(config: &Config) -> Self {
        Self {
            microphone: default_microphone(config),
            recognizer: Box::new(HttpRecognizer::new(&config.speech)),
            speaker: Box::new(SystemSpeaker),
            summaries: Box::new(WikipediaClient::new()),
            news: Box::new(NewsApiClient::new(config.news.endpoint.clone())),
            launcher: Box::new(SystemLauncher::new()),
            mailer: Box::new(SmtpMailer::new(&config.mail)),
            power: Box::new(SystemPower),
        }
    }
}

#[cfg(feature = "microphone")]
fn default_microphone(config: &Config) -> Box<dyn Microphone> {
    info!("microphone capture enabled");
    Box::new(microphone::CpalMicrophone::new(config.speech.energy_threshold))
}

#[cfg(not(feature = "microphone"))]
fn default_microphone(_config: &Config) -> Box<dyn Microphone> {
    info!("built without microphone support, speech capture will fall back to an apology");
    Box::new(speech::NoMicrophone)
}
