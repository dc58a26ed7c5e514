//! Configuration loading and management
//!
//! Everything is read from `DESKMATE_*` environment variables with
//! defaults. Secrets are never stored here: `*_ref` options name the
//! environment variable that holds the secret, resolved at use time.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Wikipedia editions offered in the language selector
pub const SUPPORTED_LANGUAGES: [&str; 5] = ["en", "es", "fr", "de", "zh"];

/// Errors raised while reading configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME is not set and DESKMATE_DATA_DIR was not provided")]
    MissingHome,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Speech capture and recognition settings
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Locale tag handed to the transcription service
    pub locale: String,
    /// Silence that ends an utterance
    pub pause_threshold: Duration,
    /// RMS level above which a frame counts as speech
    pub energy_threshold: f32,
    /// Give up when nothing was said for this long
    pub max_listen: Duration,
    /// Whisper-compatible transcription endpoint
    pub stt_endpoint: String,
    pub stt_model: String,
    /// Environment variable holding the transcription API key
    pub api_key_ref: String,
}

/// Page-summary settings
#[derive(Debug, Clone)]
pub struct WikiConfig {
    /// Wikipedia edition used at startup
    pub language: String,
    /// Number of sentences kept from the extract
    pub sentences: usize,
}

/// News provider settings
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub endpoint: String,
    pub country: String,
    /// Environment variable holding the news API key
    pub api_key_ref: String,
}

/// Mail transport settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server_host: String,
    pub port: u16,
    /// Prefix of the `<ref>_USER` / `<ref>_PASSWORD` variables
    pub credential_ref: String,
    /// From address; defaults to the credential user
    pub sender: Option<String>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    pub speech: SpeechConfig,
    pub wiki: WikiConfig,
    pub news: NewsConfig,
    pub mail: MailConfig,

    /// Whether shutdown/restart requests are honoured
    pub allow_power_control: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("DESKMATE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").ok_or(ConfigError::MissingHome)?;
                PathBuf::from(home).join(".local").join("share").join("deskmate")
            }
        };

        let socket_path = lookup("DESKMATE_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("deskmate.sock"));

        let pause_secs: f32 = parse_or(&lookup, "DESKMATE_PAUSE_THRESHOLD_SECS", 2.0)?;
        let pause_threshold = Duration::try_from_secs_f32(pause_secs)
            .ok()
            .filter(|pause| !pause.is_zero())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "DESKMATE_PAUSE_THRESHOLD_SECS".to_string(),
                value: pause_secs.to_string(),
            })?;

        let speech = SpeechConfig {
            locale: lookup("DESKMATE_SPEECH_LOCALE").unwrap_or_else(|| "en-IN".to_string()),
            pause_threshold,
            energy_threshold: parse_or(&lookup, "DESKMATE_ENERGY_THRESHOLD", 0.02f32)?,
            max_listen: Duration::from_secs(parse_or(&lookup, "DESKMATE_MAX_LISTEN_SECS", 15u64)?),
            stt_endpoint: lookup("DESKMATE_STT_ENDPOINT").unwrap_or_else(|| {
                "https://api.openai.com/v1/audio/transcriptions".to_string()
            }),
            stt_model: lookup("DESKMATE_STT_MODEL").unwrap_or_else(|| "whisper-1".to_string()),
            api_key_ref: lookup("DESKMATE_STT_API_KEY_REF")
                .unwrap_or_else(|| "DESKMATE_STT_API_KEY".to_string()),
        };

        let language = lookup("DESKMATE_WIKI_LANGUAGE").unwrap_or_else(|| "en".to_string());
        if !is_supported_language(&language) {
            return Err(ConfigError::InvalidValue {
                key: "DESKMATE_WIKI_LANGUAGE".to_string(),
                value: language,
            });
        }
        let wiki = WikiConfig {
            language,
            sentences: parse_or(&lookup, "DESKMATE_WIKI_SENTENCES", 2usize)?,
        };

        let news = NewsConfig {
            endpoint: lookup("DESKMATE_NEWS_ENDPOINT")
                .unwrap_or_else(|| "https://newsapi.org/v2/top-headlines".to_string()),
            country: lookup("DESKMATE_NEWS_COUNTRY").unwrap_or_else(|| "us".to_string()),
            api_key_ref: lookup("DESKMATE_NEWS_API_KEY_REF")
                .unwrap_or_else(|| "DESKMATE_NEWS_API_KEY".to_string()),
        };

        let mail = MailConfig {
            server_host: lookup("DESKMATE_MAIL_SERVER_HOST")
                .unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: parse_or(&lookup, "DESKMATE_MAIL_PORT", 587u16)?,
            credential_ref: lookup("DESKMATE_MAIL_CREDENTIAL_REF")
                .unwrap_or_else(|| "DESKMATE_MAIL".to_string()),
            sender: lookup("DESKMATE_MAIL_SENDER"),
        };

        Ok(Self {
            socket_path,
            data_dir,
            speech,
            wiki,
            news,
            mail,
            allow_power_control: parse_or(&lookup, "DESKMATE_ALLOW_POWER_CONTROL", false)?,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Whether the language selector offers this edition
pub fn is_supported_language(language: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&language)
}

/// Read a secret through its environment reference
pub fn resolve_secret(reference: &str) -> Option<String> {
    std::env::var(reference)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}
