//! Outgoing mail over SMTP with STARTTLS

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

use crate::config::{resolve_secret, MailConfig};

/// Errors from the mail transport
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail credentials are not configured (set {0}_USER and {0}_PASSWORD)")]
    MissingCredentials(String),

    #[error("invalid address {0:?}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("mail server rejected the login or message: {0}")]
    Auth(String),

    #[error("could not reach mail server: {0}")]
    Connection(String),
}

/// Sends a single plain-text mail
pub trait MailTransport: Send {
    fn send_mail(&mut self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP relay configured from [`MailConfig`]
pub struct SmtpMailer {
    server_host: String,
    port: u16,
    credential_ref: String,
    sender: Option<String>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            server_host: config.server_host.clone(),
            port: config.port,
            credential_ref: config.credential_ref.clone(),
            sender: config.sender.clone(),
        }
    }

    fn credentials(&self) -> Result<(String, String), MailError> {
        let user = resolve_secret(&format!("{}_USER", self.credential_ref));
        let password = resolve_secret(&format!("{}_PASSWORD", self.credential_ref));
        match (user, password) {
            (Some(user), Some(password)) => Ok((user, password)),
            _ => Err(MailError::MissingCredentials(self.credential_ref.clone())),
        }
    }
}

impl MailTransport for SmtpMailer {
    fn send_mail(&mut self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let (user, password) = self.credentials()?;
        let from = self.sender.clone().unwrap_or_else(|| user.clone());

        let message = Message::builder()
            .from(from.parse().map_err(|_| MailError::Address(from.clone()))?)
            .to(to.parse().map_err(|_| MailError::Address(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Message(e.to_string()))?;

        let transport = SmtpTransport::starttls_relay(&self.server_host)
            .map_err(|e| MailError::Connection(e.to_string()))?
            .port(self.port)
            .credentials(Credentials::new(user, password))
            .build();

        debug!(host = %self.server_host, port = self.port, "sending mail");
        transport.send(&message).map(|_| ()).map_err(|e| {
            if e.is_permanent() {
                MailError::Auth(e.to_string())
            } else {
                MailError::Connection(e.to_string())
            }
        })
    }
}
