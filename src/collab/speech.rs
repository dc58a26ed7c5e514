//! Speech input: microphone capture and transcription
//!
//! Capture ends when the speaker pauses for the configured threshold.
//! The recorded utterance is encoded as 16-bit mono WAV and posted to a
//! Whisper-compatible transcription endpoint.

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use reqwest::blocking::multipart;
use tracing::{debug, warn};

use crate::config::{resolve_secret, SpeechConfig};

/// Errors from microphone capture or speech recognition
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("no speech detected within {0:?}")]
    Timeout(Duration),

    #[error("speech was not understood")]
    Unintelligible,

    #[error("transcription API key is not configured (set {0})")]
    MissingApiKey(String),

    #[error("transcription request failed: {0}")]
    Transport(String),

    #[error("transcription service returned HTTP {0}")]
    Http(u16),
}

/// Captured mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Utterance {
    /// Length of the recording
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Encode as a 16-bit PCM WAV file in memory
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut bytes = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
            for &sample in &self.samples {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }
        Ok(bytes)
    }
}

/// Records one utterance from an audio input
pub trait Microphone: Send {
    fn record(&mut self, pause_threshold: Duration, max_listen: Duration)
        -> Result<Utterance, RecognitionError>;
}

/// Turns an utterance into text
pub trait Recognizer: Send {
    fn transcribe(&self, utterance: &Utterance, locale: &str) -> Result<String, RecognitionError>;
}

/// What the pause detector concluded after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    /// Still waiting for speech to start
    Waiting,
    /// Speech heard, keep recording
    Speaking,
    /// Speech followed by a long enough pause
    Finished,
    /// Nothing said before the listen limit
    TimedOut,
}

/// Energy-based end-of-utterance detector
///
/// Frames whose RMS reaches `threshold` count as speech. Once speech has
/// been heard, `pause` worth of consecutive quiet frames ends the
/// utterance.
#[derive(Debug, Clone)]
pub struct PauseDetector {
    threshold: f32,
    pause: Duration,
    max_listen: Duration,
    heard_speech: bool,
    silence: Duration,
    elapsed: Duration,
}

impl PauseDetector {
    pub fn new(threshold: f32, pause: Duration, max_listen: Duration) -> Self {
        Self {
            threshold,
            pause,
            max_listen,
            heard_speech: false,
            silence: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Feed one frame of samples covering `frame` of audio
    pub fn push(&mut self, samples: &[f32], frame: Duration) -> ListenState {
        self.elapsed += frame;

        if rms(samples) >= self.threshold {
            self.heard_speech = true;
            self.silence = Duration::ZERO;
            return ListenState::Speaking;
        }

        if !self.heard_speech {
            return if self.elapsed >= self.max_listen {
                ListenState::TimedOut
            } else {
                ListenState::Waiting
            };
        }

        self.silence += frame;
        if self.silence >= self.pause {
            ListenState::Finished
        } else {
            ListenState::Speaking
        }
    }
}

/// Root-mean-square amplitude of a sample slice
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Stand-in used when the binary is built without the `microphone` feature
pub struct NoMicrophone;

impl Microphone for NoMicrophone {
    fn record(&mut self, _: Duration, _: Duration) -> Result<Utterance, RecognitionError> {
        Err(RecognitionError::NoDevice)
    }
}

/// Transcription through a Whisper-compatible HTTP endpoint
pub struct HttpRecognizer {
    endpoint: String,
    model: String,
    api_key_ref: String,
}

impl HttpRecognizer {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            endpoint: config.stt_endpoint.clone(),
            model: config.stt_model.clone(),
            api_key_ref: config.api_key_ref.clone(),
        }
    }
}

impl Recognizer for HttpRecognizer {
    fn transcribe(&self, utterance: &Utterance, locale: &str) -> Result<String, RecognitionError> {
        let api_key = resolve_secret(&self.api_key_ref)
            .ok_or_else(|| RecognitionError::MissingApiKey(self.api_key_ref.clone()))?;

        let wav = utterance
            .to_wav_bytes()
            .map_err(|e| RecognitionError::Stream(e.to_string()))?;
        debug!(bytes = wav.len(), duration = ?utterance.duration(), "uploading utterance");

        let file_part = multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;
        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", language_code(locale).to_string())
            .text("response_format", "json")
            .part("file", file_part);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let response = client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "transcription request rejected");
            return Err(RecognitionError::Http(response.status().as_u16()));
        }

        let payload: serde_json::Value = response
            .json()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;
        parse_transcript(&payload)
    }
}

/// Primary language subtag of a locale ("en-IN" -> "en")
pub fn language_code(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

fn parse_transcript(payload: &serde_json::Value) -> Result<String, RecognitionError> {
    let text = payload
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        Err(RecognitionError::Unintelligible)
    } else {
        Ok(text.to_string())
    }
}
